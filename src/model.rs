//! # Data Model
//! Provider tags, the normalized feed record, classification output and the
//! two persisted shapes (`Incident`, `RegionSummary`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud providers with a status feed we understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
    Oci,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Provider::Aws, Provider::Azure, Provider::Gcp, Provider::Oci];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::Oci => "oci",
        }
    }

    /// Payload format the provider publishes.
    pub fn content_type(self) -> ContentType {
        match self {
            Provider::Aws | Provider::Azure => ContentType::Xml,
            Provider::Gcp | Provider::Oci => ContentType::Json,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "gcp" => Ok(Provider::Gcp),
            "oci" => Ok(Provider::Oci),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Xml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Resolved,
    Unknown,
}

/// Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Operational,
    Degraded,
    Outage,
    Maintenance,
}

impl ServiceStatus {
    /// Rollup priority: an outage anywhere in a region dominates everything else.
    pub fn priority(self) -> u8 {
        match self {
            ServiceStatus::Outage => 3,
            ServiceStatus::Degraded => 2,
            ServiceStatus::Maintenance => 1,
            ServiceStatus::Operational => 0,
        }
    }
}

/// One upstream feed entry after normalization. Discarded after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeedItem {
    pub provider: Provider,
    pub title: String,
    pub description: String,
    pub raw_status: Option<String>,
    pub raw_impact: Option<String>,
    pub raw_severity: Option<String>,
    pub begin_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub component_names: Vec<String>,
    /// Ordered, de-duplicated region tokens; never empty (`global` fallback).
    pub region_ids: Vec<String>,
    pub source_id: String,
}

impl RawFeedItem {
    /// Minimal constructor; optional fields start empty.
    pub fn new(provider: Provider, source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            provider,
            title: title.into(),
            description: String::new(),
            raw_status: None,
            raw_impact: None,
            raw_severity: None,
            begin_timestamp: None,
            end_timestamp: None,
            component_names: Vec::new(),
            region_ids: vec![GLOBAL_REGION.to_string()],
            source_id: source_id.into(),
        }
    }

    /// Text the keyword tables are matched against.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

pub const GLOBAL_REGION: &str = "global";

/// Upper bound for day-count windows read from configuration (100 years).
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// `days` as a duration, clamped to `0..=MAX_WINDOW_DAYS`.
pub fn window_days(days: i64) -> chrono::Duration {
    chrono::Duration::try_days(days.clamp(0, MAX_WINDOW_DAYS)).unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub lifecycle_state: LifecycleState,
    /// `None` when resolved or when the item carries no service impact.
    pub severity: Option<Severity>,
    pub confidence: Confidence,
    pub status: ServiceStatus,
    /// Structured impact field says "information only".
    pub informational: bool,
}

impl ClassificationResult {
    /// Items that must never become an incident row.
    pub fn is_excluded(&self) -> bool {
        self.lifecycle_state == LifecycleState::Resolved
            || self.informational
            || (self.status == ServiceStatus::Operational
                && self.lifecycle_state != LifecycleState::Active)
    }
}

/// Identity of a persisted incident row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentKey {
    pub provider: Provider,
    pub source_id: String,
    pub region_id: String,
}

/// One provider-service-region claim of abnormal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub provider: Provider,
    pub source_id: String,
    pub region_id: String,
    pub region_name: String,
    pub service_name: String,
    pub status: ServiceStatus,
    pub severity: Severity,
    pub is_active: bool,
    pub detection_confidence: Confidence,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl Incident {
    pub fn key(&self) -> IncidentKey {
        IncidentKey {
            provider: self.provider,
            source_id: self.source_id.clone(),
            region_id: self.region_id.clone(),
        }
    }

    /// Short stable id derived from the identity triple.
    pub fn row_id(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.provider.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.source_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.region_id.as_bytes());
        hasher
            .finalize()
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Current rollup for one `(provider, region)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub provider: Provider,
    pub region_id: String,
    pub region_name: String,
    pub overall_status: ServiceStatus,
    pub operational_count: usize,
    pub degraded_count: usize,
    pub outage_count: usize,
    pub maintenance_count: usize,
    pub total_count: usize,
    pub active_incident_count: usize,
    pub last_incident_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}
