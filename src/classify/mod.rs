//! # Classifier Engine
//! Pure mapping `RawFeedItem` → `ClassificationResult`, parameterised by the
//! provider's `RuleTable`. No I/O; `now` is passed in so results are
//! reproducible.
//!
//! Lifecycle order: authoritative end marker → resolved keywords → structured
//! status field → active keywords → age fallback.
//! Severity order: impact field → severity field → keyword tiers → default.

pub mod rules;

pub use crate::classify::rules::{ImpactClass, RuleBook, RuleTable, SeverityTiers};

use crate::model::{
    window_days, ClassificationResult, Confidence, LifecycleState, RawFeedItem, ServiceStatus,
    Severity,
};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_RESOLVED_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleBook,
    resolved_after: Duration,
}

/// Severity step outcome; `Excluded` short-circuits the whole item.
enum SeverityVerdict {
    Tier(Severity),
    Excluded,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleBook::default(), DEFAULT_RESOLVED_AFTER_DAYS)
    }
}

impl Classifier {
    pub fn new(rules: RuleBook, resolved_after_days: i64) -> Self {
        Self {
            rules,
            resolved_after: window_days(resolved_after_days),
        }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn classify(&self, item: &RawFeedItem, now: DateTime<Utc>) -> ClassificationResult {
        let table = self.rules.table(item.provider);
        let text = item.text();

        let (lifecycle_state, confidence) = self.lifecycle(table, item, &text, now);

        if lifecycle_state == LifecycleState::Resolved {
            return ClassificationResult {
                lifecycle_state,
                severity: None,
                confidence,
                status: ServiceStatus::Operational,
                informational: false,
            };
        }

        match severity(table, item, &text) {
            SeverityVerdict::Excluded => ClassificationResult {
                lifecycle_state,
                severity: None,
                confidence,
                status: ServiceStatus::Operational,
                informational: true,
            },
            SeverityVerdict::Tier(sev) => ClassificationResult {
                lifecycle_state,
                severity: Some(sev),
                confidence,
                status: derive_status(table, &text, sev),
                informational: false,
            },
        }
    }

    fn lifecycle(
        &self,
        table: &RuleTable,
        item: &RawFeedItem,
        text: &str,
        now: DateTime<Utc>,
    ) -> (LifecycleState, Confidence) {
        // Structured end marker beats any text heuristic.
        if table.authoritative_end_marker {
            let state = if item.end_timestamp.is_none() {
                LifecycleState::Active
            } else {
                LifecycleState::Resolved
            };
            return (state, Confidence::High);
        }

        if table.matches_resolved(text) {
            return (LifecycleState::Resolved, Confidence::High);
        }

        if let Some(state) = item.raw_status.as_deref().and_then(|s| table.lookup_status(s)) {
            return (state, Confidence::High);
        }

        if table.matches_active(text) {
            return (LifecycleState::Active, Confidence::High);
        }

        match item.begin_timestamp {
            Some(ts) if now - ts > self.resolved_after => {
                (LifecycleState::Resolved, Confidence::Medium)
            }
            _ => (LifecycleState::Unknown, Confidence::Low),
        }
    }
}

fn severity(table: &RuleTable, item: &RawFeedItem, text: &str) -> SeverityVerdict {
    if let Some(class) = item.raw_impact.as_deref().and_then(|s| table.lookup_impact(s)) {
        return match class.severity() {
            Some(sev) => SeverityVerdict::Tier(sev),
            None => SeverityVerdict::Excluded,
        };
    }
    if let Some(sev) = item.raw_severity.as_deref().and_then(|s| table.lookup_severity(s)) {
        return SeverityVerdict::Tier(sev);
    }
    SeverityVerdict::Tier(table.severity_tiers.classify(text).unwrap_or(table.default_severity))
}

fn derive_status(table: &RuleTable, text: &str, sev: Severity) -> ServiceStatus {
    if sev != Severity::High && table.matches_maintenance(text) {
        return ServiceStatus::Maintenance;
    }
    match sev {
        Severity::High => ServiceStatus::Outage,
        Severity::Medium => ServiceStatus::Degraded,
        Severity::Low => ServiceStatus::Operational,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provider;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn rss(provider: Provider, title: &str, age_days: Option<i64>) -> RawFeedItem {
        let mut it = RawFeedItem::new(provider, "guid", title);
        it.begin_timestamp = age_days.map(|d| now() - Duration::days(d));
        it
    }

    #[test]
    fn investigating_without_severity_keyword_defaults_medium() {
        let c = Classifier::default();
        let r = c.classify(
            &rss(Provider::Aws, "EC2: Investigating connectivity issues in us-east-1", Some(0)),
            now(),
        );
        assert_eq!(r.lifecycle_state, LifecycleState::Active);
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.severity, Some(Severity::Medium));
        assert_eq!(r.status, ServiceStatus::Degraded);
        assert!(!r.is_excluded());
    }

    #[test]
    fn resolved_keyword_wins_over_active_keyword() {
        let c = Classifier::default();
        let r = c.classify(
            &rss(Provider::Aws, "Investigating: service restored for S3", Some(0)),
            now(),
        );
        assert_eq!(r.lifecycle_state, LifecycleState::Resolved);
        assert_eq!(r.severity, None);
        assert!(r.is_excluded());
    }

    #[test]
    fn age_fallback_boundaries() {
        let c = Classifier::default();
        let old = c.classify(&rss(Provider::Azure, "Storage notice", Some(8)), now());
        assert_eq!(old.lifecycle_state, LifecycleState::Resolved);
        assert_eq!(old.confidence, Confidence::Medium);

        let exactly_seven = c.classify(&rss(Provider::Azure, "Storage notice", Some(7)), now());
        assert_eq!(exactly_seven.lifecycle_state, LifecycleState::Unknown);
        assert_eq!(exactly_seven.confidence, Confidence::Low);

        let undated = c.classify(&rss(Provider::Azure, "Storage notice", None), now());
        assert_eq!(undated.lifecycle_state, LifecycleState::Unknown);
    }

    #[test]
    fn age_threshold_is_configurable() {
        let c = Classifier::new(RuleBook::default(), 2);
        let r = c.classify(&rss(Provider::Aws, "S3 elevated errors", Some(3)), now());
        assert_eq!(r.lifecycle_state, LifecycleState::Resolved);
    }

    #[test]
    fn maintenance_items_get_maintenance_status() {
        let c = Classifier::default();
        let r = c.classify(
            &rss(Provider::Azure, "Ongoing scheduled maintenance for SQL Database", Some(0)),
            now(),
        );
        assert_eq!(r.lifecycle_state, LifecycleState::Active);
        assert_eq!(r.severity, Some(Severity::Low));
        assert_eq!(r.status, ServiceStatus::Maintenance);
    }

    #[test]
    fn unknown_informational_item_is_excluded() {
        let c = Classifier::default();
        let r = c.classify(&rss(Provider::Aws, "Informational message: IAM", Some(1)), now());
        assert_eq!(r.lifecycle_state, LifecycleState::Unknown);
        assert_eq!(r.status, ServiceStatus::Operational);
        assert!(r.is_excluded());
    }

    #[test]
    fn gcp_ignores_text_and_uses_end_marker() {
        let c = Classifier::default();
        let mut it = RawFeedItem::new(Provider::Gcp, "inc-1", "Issue resolved for Cloud SQL");
        it.raw_impact = Some("SERVICE_OUTAGE".into());
        let r = c.classify(&it, now());
        assert_eq!(r.lifecycle_state, LifecycleState::Active);
        assert_eq!(r.severity, Some(Severity::High));
        assert_eq!(r.confidence, Confidence::High);

        it.end_timestamp = Some(now());
        assert_eq!(c.classify(&it, now()).lifecycle_state, LifecycleState::Resolved);
    }

    #[test]
    fn gcp_information_impact_is_excluded() {
        let c = Classifier::default();
        let mut it = RawFeedItem::new(Provider::Gcp, "inc-2", "Heads up");
        it.raw_impact = Some("SERVICE_INFORMATION".into());
        let r = c.classify(&it, now());
        assert!(r.informational);
        assert!(r.is_excluded());
    }

    #[test]
    fn gcp_severity_field_used_when_impact_unmapped() {
        let c = Classifier::default();
        let mut it = RawFeedItem::new(Provider::Gcp, "inc-3", "Something");
        it.raw_severity = Some("low".into());
        assert_eq!(c.classify(&it, now()).severity, Some(Severity::Low));

        it.raw_severity = None;
        assert_eq!(c.classify(&it, now()).severity, Some(Severity::Medium));
    }

    #[test]
    fn oci_status_field_and_impact() {
        let c = Classifier::default();
        let mut it = RawFeedItem::new(Provider::Oci, "oci-1", "Compute launch failures");
        it.raw_status = Some("identified".into());
        it.raw_impact = Some("minor".into());
        let r = c.classify(&it, now());
        assert_eq!(r.lifecycle_state, LifecycleState::Active);
        assert_eq!(r.severity, Some(Severity::Medium));

        it.raw_status = Some("resolved".into());
        assert!(c.classify(&it, now()).is_excluded());
    }
}
