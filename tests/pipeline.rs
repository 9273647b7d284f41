// tests/pipeline.rs
//
// Full polling cycles over fixture feeds: insert counts, idempotence,
// provider isolation and the region rollup that follows.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cloud_status_monitor::assemble::IncidentAssembler;
use cloud_status_monitor::classify::Classifier;
use cloud_status_monitor::ingest::providers::ProviderFeed;
use cloud_status_monitor::ingest::types::{FeedPayload, StatusFeed};
use cloud_status_monitor::ingest::{run_cycle, CycleContext};
use cloud_status_monitor::model::{Provider, ServiceStatus};
use cloud_status_monitor::store::{IncidentStore, InMemoryStore};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn fixture_feeds() -> Vec<Arc<dyn StatusFeed>> {
    vec![
        Arc::new(ProviderFeed::from_fixture(
            Provider::Aws,
            include_str!("fixtures/aws_rss.xml"),
        )),
        Arc::new(ProviderFeed::from_fixture(
            Provider::Azure,
            include_str!("fixtures/azure_rss.xml"),
        )),
        Arc::new(ProviderFeed::from_fixture(
            Provider::Gcp,
            include_str!("fixtures/gcp_incidents.json"),
        )),
        Arc::new(ProviderFeed::from_fixture(
            Provider::Oci,
            include_str!("fixtures/oci_status.json"),
        )),
    ]
}

fn context(store: Arc<InMemoryStore>) -> CycleContext {
    CycleContext {
        classifier: Arc::new(Classifier::default()),
        assembler: Arc::new(IncidentAssembler::default()),
        store,
        fetch_timeout: Duration::from_millis(200),
    }
}

struct FailingFeed;

#[async_trait]
impl StatusFeed for FailingFeed {
    async fn fetch_latest(&self) -> Result<FeedPayload> {
        Err(anyhow!("connection refused"))
    }
    fn provider(&self) -> Provider {
        Provider::Aws
    }
}

struct SlowFeed;

#[async_trait]
impl StatusFeed for SlowFeed {
    async fn fetch_latest(&self) -> Result<FeedPayload> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(FeedPayload::json("[]"))
    }
    fn provider(&self) -> Provider {
        Provider::Gcp
    }
}

#[tokio::test]
async fn fixture_cycle_inserts_expected_rows() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());
    let report = run_cycle(&fixture_feeds(), &ctx, now()).await;

    let aws = report.provider(Provider::Aws).unwrap();
    assert_eq!((aws.items, aws.malformed, aws.excluded, aws.inserted), (4, 1, 3, 1));
    assert_eq!(aws.resolved_marked, 2);

    let azure = report.provider(Provider::Azure).unwrap();
    assert_eq!((azure.items, azure.excluded, azure.inserted), (3, 1, 2));

    let gcp = report.provider(Provider::Gcp).unwrap();
    assert_eq!((gcp.items, gcp.malformed, gcp.excluded, gcp.inserted), (4, 1, 2, 2));

    let oci = report.provider(Provider::Oci).unwrap();
    assert_eq!((oci.items, oci.excluded, oci.inserted), (3, 1, 3));

    assert_eq!(report.inserted(), 8);
    assert_eq!(report.summaries, 8);
    assert!(report.providers.iter().all(|p| p.error.is_none()));
    assert_eq!(store.list_incidents(None).await.unwrap().len(), 8);
}

#[tokio::test]
async fn second_cycle_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());
    let first = run_cycle(&fixture_feeds(), &ctx, now()).await;
    let later = now() + chrono::Duration::minutes(5);
    let second = run_cycle(&fixture_feeds(), &ctx, later).await;

    assert_eq!(second.inserted(), 0);
    let dupes: usize = second.providers.iter().map(|p| p.duplicates).sum();
    assert_eq!(dupes, first.inserted());
    assert_eq!(store.list_incidents(None).await.unwrap().len(), 8);
}

#[tokio::test]
async fn failing_and_slow_providers_are_skipped() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());
    let feeds: Vec<Arc<dyn StatusFeed>> = vec![
        Arc::new(FailingFeed),
        Arc::new(SlowFeed),
        Arc::new(ProviderFeed::from_fixture(
            Provider::Oci,
            include_str!("fixtures/oci_status.json"),
        )),
    ];
    let report = run_cycle(&feeds, &ctx, now()).await;

    let aws = report.provider(Provider::Aws).unwrap();
    assert!(aws.error.as_deref().unwrap().contains("connection refused"));
    let gcp = report.provider(Provider::Gcp).unwrap();
    assert!(gcp.error.as_deref().unwrap().contains("timed out"));
    let oci = report.provider(Provider::Oci).unwrap();
    assert!(oci.error.is_none());
    assert_eq!(oci.inserted, 3);
}

#[tokio::test]
async fn no_resolved_text_ever_becomes_an_incident() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());
    run_cycle(&fixture_feeds(), &ctx, now()).await;

    let classifier = Classifier::default();
    for inc in store.list_incidents(None).await.unwrap() {
        let table = classifier.rules().table(inc.provider);
        if !table.authoritative_end_marker {
            let text = format!("{} {}", inc.title, inc.description);
            assert!(!table.matches_resolved(&text), "resolved text stored: {text}");
        }
    }
}

#[tokio::test]
async fn gcp_activity_tracks_end_timestamp_only() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());
    let body = r#"[
      {"id":"r1","external_desc":"Issue resolved and service restored","end":null,"status_impact":"SERVICE_DISRUPTION"},
      {"id":"r2","external_desc":"Investigating outage","end":"2025-03-10T11:00:00Z","status_impact":"SERVICE_OUTAGE"}
    ]"#;
    let feeds: Vec<Arc<dyn StatusFeed>> =
        vec![Arc::new(ProviderFeed::from_fixture(Provider::Gcp, body))];
    let report = run_cycle(&feeds, &ctx, now()).await;

    let gcp = report.provider(Provider::Gcp).unwrap();
    assert_eq!(gcp.inserted, 1);
    assert_eq!(gcp.resolved_marked, 1);

    let rows = store.list_incidents(Some(Provider::Gcp)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_id, "r1");
    assert!(rows[0].is_active);
    assert!(rows[0].end_time.is_none());
}

#[tokio::test]
async fn resolution_in_a_later_cycle_clears_the_region() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());

    let open = r#"{"incidents":[{"id":"x1","name":"Compute launch failures","status":"investigating",
        "impact":"major","components":[{"name":"Compute (us-ashburn-1)"}]}]}"#;
    let closed = r#"{"incidents":[{"id":"x1","name":"Compute launch failures","status":"resolved",
        "impact":"major","components":[{"name":"Compute (us-ashburn-1)"}]}]}"#;

    let feeds: Vec<Arc<dyn StatusFeed>> =
        vec![Arc::new(ProviderFeed::from_fixture(Provider::Oci, open))];
    run_cycle(&feeds, &ctx, now()).await;
    let summaries = store.get_region_summaries(Some(Provider::Oci)).await.unwrap();
    assert_eq!(summaries[0].overall_status, ServiceStatus::Outage);

    let feeds: Vec<Arc<dyn StatusFeed>> =
        vec![Arc::new(ProviderFeed::from_fixture(Provider::Oci, closed))];
    run_cycle(&feeds, &ctx, now()).await;
    let summaries = store.get_region_summaries(Some(Provider::Oci)).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].region_id, "us-ashburn-1");
    assert_eq!(summaries[0].overall_status, ServiceStatus::Operational);
    assert_eq!(summaries[0].active_incident_count, 0);
    assert!(store
        .get_active_incidents(Some(Provider::Oci), None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn reopened_incident_returns_to_the_active_set() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = context(store.clone());

    let doc = |status: &str| {
        format!(
            r#"{{"incidents":[{{"id":"x2","name":"Block Volume attach failures","status":"{status}",
            "impact":"major","components":[{{"name":"Block Volume (eu-frankfurt-1)"}}]}}]}}"#
        )
    };
    let cycle = |status: &str| -> Vec<Arc<dyn StatusFeed>> {
        vec![Arc::new(ProviderFeed::from_fixture(Provider::Oci, &doc(status)))]
    };

    run_cycle(&cycle("investigating"), &ctx, now()).await;
    let closed = run_cycle(&cycle("resolved"), &ctx, now()).await;
    assert_eq!(closed.provider(Provider::Oci).unwrap().resolved_marked, 1);
    assert!(store
        .get_active_incidents(Some(Provider::Oci), None)
        .await
        .unwrap()
        .is_empty());

    let reopened = run_cycle(&cycle("investigating"), &ctx, now()).await;
    let oci = reopened.provider(Provider::Oci).unwrap();
    assert_eq!(oci.reopened, 1);
    assert_eq!(oci.inserted, 0);

    let active = store
        .get_active_incidents(Some(Provider::Oci), None)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].source_id, "x2");
    let summaries = store.get_region_summaries(Some(Provider::Oci)).await.unwrap();
    assert_eq!(summaries[0].overall_status, ServiceStatus::Outage);
}
