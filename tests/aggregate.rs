// tests/aggregate.rs
//
// Region rollups computed from the store.

use chrono::{DateTime, Duration, Utc};

use cloud_status_monitor::aggregate::refresh_all;
use cloud_status_monitor::model::{Confidence, Incident, Provider, ServiceStatus, Severity};
use cloud_status_monitor::regions::RegionCatalog;
use cloud_status_monitor::{IncidentStore, InMemoryStore};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn incident(
    provider: Provider,
    source: &str,
    region: &str,
    status: ServiceStatus,
    active: bool,
) -> Incident {
    Incident {
        provider,
        source_id: source.into(),
        region_id: region.into(),
        region_name: RegionCatalog::builtin().resolve_name(provider, region),
        service_name: "svc".into(),
        status,
        severity: Severity::Medium,
        is_active: active,
        detection_confidence: Confidence::High,
        title: source.into(),
        description: String::new(),
        start_time: now() - Duration::hours(2),
        end_time: None,
        last_updated: now(),
    }
}

#[tokio::test]
async fn degraded_and_operational_roll_up_to_degraded() {
    let store = InMemoryStore::new();
    store
        .upsert_incident(incident(Provider::Aws, "a", "us-east-1", ServiceStatus::Degraded, true))
        .await
        .unwrap();
    store
        .upsert_incident(incident(Provider::Aws, "b", "us-east-1", ServiceStatus::Operational, false))
        .await
        .unwrap();

    let written = refresh_all(&store, &RegionCatalog::builtin(), now()).await.unwrap();
    assert_eq!(written, 1);

    let s = &store.get_region_summaries(Some(Provider::Aws)).await.unwrap()[0];
    assert_eq!(s.overall_status, ServiceStatus::Degraded);
    assert_eq!(s.active_incident_count, 1);
    assert_eq!(s.total_count, 2);
    assert_eq!(s.region_name, "US East (N. Virginia)");
}

#[tokio::test]
async fn outage_beats_maintenance() {
    let store = InMemoryStore::new();
    store
        .upsert_incident(incident(Provider::Oci, "m", "uk-london-1", ServiceStatus::Maintenance, true))
        .await
        .unwrap();
    store
        .upsert_incident(incident(Provider::Oci, "o", "uk-london-1", ServiceStatus::Outage, true))
        .await
        .unwrap();

    refresh_all(&store, &RegionCatalog::builtin(), now()).await.unwrap();
    let s = &store.get_region_summaries(Some(Provider::Oci)).await.unwrap()[0];
    assert_eq!(s.overall_status, ServiceStatus::Outage);
    assert_eq!((s.outage_count, s.maintenance_count), (1, 1));
}

#[tokio::test]
async fn regions_keep_a_summary_after_their_incidents_go_away() {
    let store = InMemoryStore::new();
    let inc = incident(Provider::Azure, "z", "eastus", ServiceStatus::Outage, true);
    let key = inc.key();
    store.upsert_incident(inc).await.unwrap();
    refresh_all(&store, &RegionCatalog::builtin(), now()).await.unwrap();

    store.delete_incidents(&[key]).await.unwrap();
    let later = now() + Duration::minutes(5);
    refresh_all(&store, &RegionCatalog::builtin(), later).await.unwrap();

    let summaries = store.get_region_summaries(Some(Provider::Azure)).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].overall_status, ServiceStatus::Operational);
    assert_eq!(summaries[0].total_count, 0);
    assert_eq!(summaries[0].region_name, "East US");
    assert_eq!(summaries[0].last_updated, later);
}
