// tests/api_http.rs
//
// HTTP-level tests for the dashboard Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use cloud_status_monitor::assemble::IncidentAssembler;
use cloud_status_monitor::ingest::providers::ProviderFeed;
use cloud_status_monitor::ingest::types::StatusFeed;
use cloud_status_monitor::metrics::Metrics;
use cloud_status_monitor::model::Provider;
use cloud_status_monitor::{
    create_router, run_cycle, AppState, Classifier, CycleContext, InMemoryStore,
};

const BODY_LIMIT: usize = 1024 * 1024;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Router over a store filled by one fixture cycle.
async fn seeded_router() -> Router {
    let store = Arc::new(InMemoryStore::new());
    let ctx = CycleContext {
        classifier: Arc::new(Classifier::default()),
        assembler: Arc::new(IncidentAssembler::default()),
        store: store.clone(),
        fetch_timeout: Duration::from_secs(5),
    };
    let feeds: Vec<Arc<dyn StatusFeed>> = vec![
        Arc::new(ProviderFeed::from_fixture(
            Provider::Aws,
            include_str!("fixtures/aws_rss.xml"),
        )),
        Arc::new(ProviderFeed::from_fixture(
            Provider::Gcp,
            include_str!("fixtures/gcp_incidents.json"),
        )),
    ];
    run_cycle(&feeds, &ctx, now()).await;
    create_router(AppState { store })
}

async fn get(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = seeded_router().await;
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn active_incidents_filter_by_provider_and_region() {
    let app = seeded_router().await;

    let (status, all) = get(app.clone(), "/api/incidents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, gcp) = get(app.clone(), "/api/incidents?provider=GCP").await;
    let gcp = gcp.as_array().unwrap();
    assert_eq!(gcp.len(), 2);
    assert!(gcp.iter().all(|i| i["provider"] == "gcp"));
    assert!(gcp.iter().all(|i| i["id"].as_str().unwrap().len() == 16));

    let (_, one) = get(app, "/api/incidents?provider=aws&region=us-east-1").await;
    let one = one.as_array().unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0]["region_name"], "US East (N. Virginia)");
    assert_eq!(one[0]["status"], "degraded");
}

#[tokio::test]
async fn unknown_provider_is_bad_request() {
    let app = seeded_router().await;
    let (status, body) = get(app, "/api/regions?provider=ibm").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn regions_list_and_detail() {
    let app = seeded_router().await;

    let (status, list) = get(app.clone(), "/api/regions").await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["provider"], "aws");

    let (status, detail) = get(app.clone(), "/api/regions/gcp/us-central1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["summary"]["overall_status"], "outage");
    assert_eq!(detail["summary"]["region_name"], "Iowa");
    assert_eq!(detail["incidents"].as_array().unwrap().len(), 1);

    let (status, missing) = get(app, "/api/regions/aws/ap-south-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"]["message"], "No Data Available");
}

#[tokio::test]
async fn metrics_route_renders_cycle_series() {
    let metrics = Metrics::init(300).expect("install recorder once per test binary");
    let app = seeded_router().await.merge(metrics.router());

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("incidents_inserted_total"));
    assert!(text.contains("cycle_last_run_ts"));
}
