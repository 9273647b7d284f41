//! Turns one classified feed item into per-region `Incident` rows.

use chrono::{DateTime, Utc};

use crate::classify::RuleTable;
use crate::model::{ClassificationResult, Incident, LifecycleState, RawFeedItem, GLOBAL_REGION};
use crate::regions::RegionCatalog;

#[derive(Debug, Clone)]
pub struct IncidentAssembler {
    catalog: RegionCatalog,
}

impl Default for IncidentAssembler {
    fn default() -> Self {
        Self::new(RegionCatalog::builtin())
    }
}

impl IncidentAssembler {
    pub fn new(catalog: RegionCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// One incident per distinct region hint. Excluded items yield nothing.
    pub fn assemble(
        &self,
        table: &RuleTable,
        item: &RawFeedItem,
        result: &ClassificationResult,
        now: DateTime<Utc>,
    ) -> Vec<Incident> {
        if result.is_excluded() {
            return Vec::new();
        }
        let Some(severity) = result.severity else {
            return Vec::new();
        };

        let is_active = if table.authoritative_end_marker {
            item.end_timestamp.is_none()
        } else {
            result.lifecycle_state == LifecycleState::Active
        };
        let end_time = if table.tracks_end_time {
            item.end_timestamp
        } else {
            None
        };
        let service_name = item
            .component_names
            .first()
            .cloned()
            .unwrap_or_else(|| table.generic_service.clone());

        let mut regions: Vec<&str> = Vec::with_capacity(item.region_ids.len());
        for r in &item.region_ids {
            if !r.is_empty() && !regions.contains(&r.as_str()) {
                regions.push(r);
            }
        }
        if regions.is_empty() {
            regions.push(GLOBAL_REGION);
        }

        regions
            .into_iter()
            .map(|region_id| Incident {
                provider: item.provider,
                source_id: item.source_id.clone(),
                region_id: region_id.to_string(),
                region_name: self.catalog.resolve_name(item.provider, region_id),
                service_name: service_name.clone(),
                status: result.status,
                severity,
                is_active,
                detection_confidence: result.confidence,
                title: item.title.clone(),
                description: item.description.clone(),
                start_time: item.begin_timestamp.unwrap_or(now),
                end_time,
                last_updated: now,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::model::{Provider, ServiceStatus, Severity};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn one_incident_per_region_with_resolved_names() {
        let c = Classifier::default();
        let a = IncidentAssembler::default();
        let mut it = RawFeedItem::new(Provider::Aws, "g-1", "EC2 outage: investigating");
        it.region_ids = vec!["us-east-1".into(), "eu-west-1".into(), "us-east-1".into()];
        it.component_names = vec!["EC2".into()];
        let r = c.classify(&it, now());

        let out = a.assemble(c.rules().table(Provider::Aws), &it, &r, now());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].region_name, "US East (N. Virginia)");
        assert_eq!(out[0].service_name, "EC2");
        assert_eq!(out[0].status, ServiceStatus::Outage);
        assert_eq!(out[0].severity, Severity::High);
        assert!(out[0].is_active);
        assert_eq!(out[0].start_time, now());
        assert!(out[0].end_time.is_none());
    }

    #[test]
    fn excluded_items_produce_nothing() {
        let c = Classifier::default();
        let a = IncidentAssembler::default();
        let it = RawFeedItem::new(Provider::Azure, "g-2", "Mitigated: Storage latency");
        let r = c.classify(&it, now());
        assert!(a.assemble(c.rules().table(Provider::Azure), &it, &r, now()).is_empty());
    }

    #[test]
    fn unknown_lifecycle_is_stored_inactive() {
        let c = Classifier::default();
        let a = IncidentAssembler::default();
        let it = RawFeedItem::new(Provider::Aws, "g-3", "Elevated S3 latency");
        let r = c.classify(&it, now());
        assert_eq!(r.lifecycle_state, LifecycleState::Unknown);
        let out = a.assemble(c.rules().table(Provider::Aws), &it, &r, now());
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_active);
        assert_eq!(out[0].region_id, "global");
        assert_eq!(out[0].service_name, "AWS Service");
    }

    #[test]
    fn assembling_twice_is_identical() {
        let c = Classifier::default();
        let a = IncidentAssembler::default();
        let mut it = RawFeedItem::new(Provider::Oci, "o-1", "Compute degraded");
        it.raw_status = Some("monitoring".into());
        it.end_timestamp = Some(now());
        let r = c.classify(&it, now());
        let t = c.rules().table(Provider::Oci);
        let first = a.assemble(t, &it, &r, now());
        assert_eq!(first, a.assemble(t, &it, &r, now()));
        assert_eq!(first[0].end_time, Some(now()));
    }
}
