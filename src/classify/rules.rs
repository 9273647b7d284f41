//! Per-provider rule tables (overridable from `config/rules.toml` or `.json`).
//!
//! One `RuleTable` per provider drives the whole classifier:
//! - `resolved_keywords` / `active_keywords`: lifecycle text signals
//! - `authoritative_end_marker`: lifecycle comes from the end timestamp only
//! - `tracks_end_time`: incidents keep the feed's end timestamp
//! - `status_field`:   raw status value → lifecycle state
//! - `impact_field`:   raw impact value → severity tier or `excluded`
//! - `severity_field`: raw severity value → severity tier
//! - `severity_tiers`: High / Medium / Low keyword lists, checked in that order
//! - `maintenance_keywords`: marks planned work
//! - `service_tokens`, `generic_service`: service naming for RSS titles
//!
//! Keyword matching is case- and whitespace-insensitive substring matching.

use crate::model::{LifecycleState, Provider, Severity};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactClass {
    High,
    Medium,
    Low,
    /// No real service impact; the item never becomes an incident.
    Excluded,
}

impl ImpactClass {
    pub fn severity(self) -> Option<Severity> {
        match self {
            ImpactClass::High => Some(Severity::High),
            ImpactClass::Medium => Some(Severity::Medium),
            ImpactClass::Low => Some(Severity::Low),
            ImpactClass::Excluded => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityTiers {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl SeverityTiers {
    /// First tier with any hit wins; match counts never matter.
    pub fn classify(&self, text: &str) -> Option<Severity> {
        if any_contains(text, &self.high) {
            Some(Severity::High)
        } else if any_contains(text, &self.medium) {
            Some(Severity::Medium)
        } else if any_contains(text, &self.low) {
            Some(Severity::Low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    pub resolved_keywords: Vec<String>,
    #[serde(default)]
    pub active_keywords: Vec<String>,
    #[serde(default)]
    pub authoritative_end_marker: bool,
    /// The feed carries a structured end timestamp worth persisting.
    #[serde(default)]
    pub tracks_end_time: bool,
    #[serde(default)]
    pub status_field: HashMap<String, LifecycleState>,
    #[serde(default)]
    pub impact_field: HashMap<String, ImpactClass>,
    #[serde(default)]
    pub severity_field: HashMap<String, Severity>,
    #[serde(default)]
    pub severity_tiers: SeverityTiers,
    #[serde(default)]
    pub maintenance_keywords: Vec<String>,
    #[serde(default = "default_severity")]
    pub default_severity: Severity,
    #[serde(default)]
    pub service_tokens: Vec<String>,
    pub generic_service: String,
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn keyed<T: Copy>(items: &[(&str, T)]) -> HashMap<String, T> {
    items
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), *v))
        .collect()
}

impl RuleTable {
    pub fn aws() -> Self {
        Self {
            resolved_keywords: strings(&["resolved", "restored", "completed", "fixed"]),
            active_keywords: strings(&[
                "investigating",
                "identified",
                "monitoring",
                "ongoing",
                "experiencing",
            ]),
            authoritative_end_marker: false,
            tracks_end_time: false,
            status_field: HashMap::new(),
            impact_field: HashMap::new(),
            severity_field: HashMap::new(),
            severity_tiers: SeverityTiers {
                high: strings(&["outage", "unavailable", "down", "failed", "major", "critical"]),
                medium: strings(&[
                    "degraded",
                    "elevated",
                    "intermittent",
                    "minor",
                    "moderate",
                    "slow",
                ]),
                low: strings(&["maintenance", "scheduled", "informational", "advisory"]),
            },
            maintenance_keywords: strings(&["maintenance", "scheduled"]),
            default_severity: Severity::Medium,
            service_tokens: strings(&[
                "EC2",
                "S3",
                "RDS",
                "Lambda",
                "CloudFront",
                "Route 53",
                "ELB",
                "VPC",
                "IAM",
                "CloudWatch",
                "SNS",
                "SQS",
                "DynamoDB",
                "ECS",
                "EKS",
                "API Gateway",
            ]),
            generic_service: "AWS Service".to_string(),
        }
    }

    pub fn azure() -> Self {
        Self {
            resolved_keywords: strings(&["resolved", "mitigated", "restored", "completed"]),
            active_keywords: strings(&["investigating", "preliminary", "ongoing", "mitigating"]),
            authoritative_end_marker: false,
            tracks_end_time: false,
            status_field: HashMap::new(),
            impact_field: HashMap::new(),
            severity_field: HashMap::new(),
            severity_tiers: SeverityTiers {
                high: strings(&[
                    "outage",
                    "unavailable",
                    "major impact",
                    "down",
                    "failed",
                    "critical",
                ]),
                medium: strings(&[
                    "degraded",
                    "performance issues",
                    "intermittent",
                    "elevated",
                    "minor",
                    "moderate",
                ]),
                low: strings(&["advisory", "maintenance", "scheduled", "informational"]),
            },
            maintenance_keywords: strings(&["maintenance", "scheduled"]),
            default_severity: Severity::Medium,
            service_tokens: strings(&[
                "Virtual Machines",
                "Storage",
                "SQL Database",
                "Functions",
                "CDN",
                "DNS",
                "Load Balancer",
                "Virtual Network",
                "Active Directory",
                "Entra ID",
                "Monitor",
                "Service Bus",
                "Cosmos DB",
                "Container Instances",
                "Kubernetes Service",
                "API Management",
            ]),
            generic_service: "Azure Service".to_string(),
        }
    }

    pub fn gcp() -> Self {
        Self {
            resolved_keywords: Vec::new(),
            active_keywords: Vec::new(),
            authoritative_end_marker: true,
            tracks_end_time: true,
            status_field: HashMap::new(),
            impact_field: keyed(&[
                ("SERVICE_OUTAGE", ImpactClass::High),
                ("SERVICE_DISRUPTION", ImpactClass::Medium),
                ("SERVICE_INFORMATION", ImpactClass::Excluded),
            ]),
            severity_field: keyed(&[
                ("high", Severity::High),
                ("medium", Severity::Medium),
                ("low", Severity::Low),
            ]),
            severity_tiers: SeverityTiers::default(),
            maintenance_keywords: Vec::new(),
            default_severity: Severity::Medium,
            service_tokens: Vec::new(),
            generic_service: "GCP Service".to_string(),
        }
    }

    pub fn oci() -> Self {
        Self {
            resolved_keywords: strings(&["resolved", "restored", "completed"]),
            active_keywords: strings(&["investigating", "identified", "monitoring", "ongoing"]),
            authoritative_end_marker: false,
            tracks_end_time: true,
            status_field: keyed(&[
                ("resolved", LifecycleState::Resolved),
                ("completed", LifecycleState::Resolved),
                ("postmortem", LifecycleState::Resolved),
                ("investigating", LifecycleState::Active),
                ("identified", LifecycleState::Active),
                ("monitoring", LifecycleState::Active),
            ]),
            impact_field: keyed(&[
                ("critical", ImpactClass::High),
                ("major", ImpactClass::High),
                ("minor", ImpactClass::Medium),
                ("moderate", ImpactClass::Medium),
                ("none", ImpactClass::Low),
            ]),
            severity_field: HashMap::new(),
            severity_tiers: SeverityTiers {
                high: strings(&["major", "outage", "unavailable", "down", "failed", "critical"]),
                medium: strings(&["minor", "degraded", "performance", "elevated", "intermittent"]),
                low: strings(&["maintenance", "scheduled", "informational", "advisory"]),
            },
            maintenance_keywords: strings(&["maintenance", "scheduled"]),
            default_severity: Severity::Medium,
            service_tokens: Vec::new(),
            generic_service: "OCI Service".to_string(),
        }
    }

    pub fn builtin(provider: Provider) -> Self {
        match provider {
            Provider::Aws => Self::aws(),
            Provider::Azure => Self::azure(),
            Provider::Gcp => Self::gcp(),
            Provider::Oci => Self::oci(),
        }
    }

    pub fn matches_resolved(&self, text: &str) -> bool {
        any_contains(text, &self.resolved_keywords)
    }

    pub fn matches_active(&self, text: &str) -> bool {
        any_contains(text, &self.active_keywords)
    }

    pub fn matches_maintenance(&self, text: &str) -> bool {
        any_contains(text, &self.maintenance_keywords)
    }

    pub fn lookup_status(&self, raw: &str) -> Option<LifecycleState> {
        self.status_field.get(&field_key(raw)).copied()
    }

    pub fn lookup_impact(&self, raw: &str) -> Option<ImpactClass> {
        self.impact_field.get(&field_key(raw)).copied()
    }

    pub fn lookup_severity(&self, raw: &str) -> Option<Severity> {
        self.severity_field.get(&field_key(raw)).copied()
    }
}

/// One rule table per provider. Adding a provider adds one entry here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default = "RuleTable::aws")]
    pub aws: RuleTable,
    #[serde(default = "RuleTable::azure")]
    pub azure: RuleTable,
    #[serde(default = "RuleTable::gcp")]
    pub gcp: RuleTable,
    #[serde(default = "RuleTable::oci")]
    pub oci: RuleTable,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            aws: RuleTable::aws(),
            azure: RuleTable::azure(),
            gcp: RuleTable::gcp(),
            oci: RuleTable::oci(),
        }
    }
}

impl RuleBook {
    pub fn table(&self, provider: Provider) -> &RuleTable {
        match provider {
            Provider::Aws => &self.aws,
            Provider::Azure => &self.azure,
            Provider::Gcp => &self.gcp,
            Provider::Oci => &self.oci,
        }
    }

    /// Load rule tables from TOML or JSON (by extension).
    /// Providers missing from the file keep their built-in table.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading rules from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "toml" => toml::from_str(&content).context("parsing rules toml"),
            "json" => serde_json::from_str(&content).context("parsing rules json"),
            other => Err(anyhow!("unsupported rules format `{other}`")),
        }
    }

    /// Like `load_from_file`, but falls back to built-in tables on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load_from_file(path) {
            Ok(book) => {
                tracing::info!(target: "classify", path = %path.display(), "loaded rule tables");
                book
            }
            Err(e) => {
                tracing::warn!(target: "classify", error = %format!("{e:#}"), "using built-in rule tables");
                Self::default()
            }
        }
    }
}

// --- matching internals ---

pub(crate) fn any_contains(text: &str, phrases: &[String]) -> bool {
    let t = normalize(text);
    phrases.iter().any(|p| {
        let p = normalize(p);
        !p.is_empty() && t.contains(p.as_str())
    })
}

fn field_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Lowercase and condense whitespace runs to one space.
pub(crate) fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        let lc = ch.to_ascii_lowercase();
        if lc.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(lc);
            last_space = false;
        }
    }
    out.trim().to_string()
}
