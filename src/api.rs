//! Read-only dashboard API over the incident store.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::StoreError;
use crate::model::{Incident, Provider, RegionSummary};
use crate::store::IncidentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IncidentStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No Data Available")]
    NoData,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoData => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NoData => "NO_DATA",
            ApiError::Store(_) => "STORE_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(target: "store", error = %message, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": message,
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/incidents", get(list_active_incidents))
        .route("/api/regions", get(list_regions))
        .route("/api/regions/{provider}/{region}", get(region_detail))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct IncidentQuery {
    provider: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegionQuery {
    provider: Option<String>,
}

#[derive(Debug, Serialize)]
struct IncidentView {
    id: String,
    #[serde(flatten)]
    incident: Incident,
}

impl From<Incident> for IncidentView {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.row_id(),
            incident,
        }
    }
}

#[derive(Debug, Serialize)]
struct RegionDetail {
    summary: RegionSummary,
    incidents: Vec<IncidentView>,
}

fn parse_provider(raw: Option<&str>) -> Result<Option<Provider>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse::<Provider>().map(Some).map_err(ApiError::BadRequest),
    }
}

async fn list_active_incidents(
    State(state): State<AppState>,
    Query(q): Query<IncidentQuery>,
) -> Result<Json<Vec<IncidentView>>, ApiError> {
    let provider = parse_provider(q.provider.as_deref())?;
    let region = q.region.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let incidents = state.store.get_active_incidents(provider, region).await?;
    Ok(Json(incidents.into_iter().map(IncidentView::from).collect()))
}

async fn list_regions(
    State(state): State<AppState>,
    Query(q): Query<RegionQuery>,
) -> Result<Json<Vec<RegionSummary>>, ApiError> {
    let provider = parse_provider(q.provider.as_deref())?;
    let mut summaries = state.store.get_region_summaries(provider).await?;
    summaries.sort_by(|a, b| {
        a.provider
            .cmp(&b.provider)
            .then_with(|| a.region_id.cmp(&b.region_id))
    });
    Ok(Json(summaries))
}

async fn region_detail(
    State(state): State<AppState>,
    Path((provider, region)): Path<(String, String)>,
) -> Result<Json<RegionDetail>, ApiError> {
    let provider = parse_provider(Some(&provider))?.ok_or(ApiError::NoData)?;
    let region = region.trim().to_ascii_lowercase();
    let summary = state
        .store
        .get_region_summaries(Some(provider))
        .await?
        .into_iter()
        .find(|s| s.region_id == region)
        .ok_or(ApiError::NoData)?;
    let incidents = state
        .store
        .get_active_incidents(Some(provider), Some(&region))
        .await?;
    Ok(Json(RegionDetail {
        summary,
        incidents: incidents.into_iter().map(IncidentView::from).collect(),
    }))
}
