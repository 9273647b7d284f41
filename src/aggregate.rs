//! # Region Summary Aggregator
//! Full recompute of every `(provider, region)` rollup from the incident set.
//! Regions that once had incidents keep a summary and drop back to
//! `operational` once nothing live remains there.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use metrics::gauge;

use crate::error::StoreResult;
use crate::model::{Incident, Provider, RegionSummary, ServiceStatus};
use crate::regions::RegionCatalog;
use crate::store::IncidentStore;

/// Roll up the incidents of one region. `incidents` must already exclude
/// anything superseded by a resolution.
pub fn summarize(
    provider: Provider,
    region_id: &str,
    region_name: &str,
    incidents: &[&Incident],
    now: DateTime<Utc>,
) -> RegionSummary {
    let mut summary = RegionSummary {
        provider,
        region_id: region_id.to_string(),
        region_name: region_name.to_string(),
        overall_status: ServiceStatus::Operational,
        operational_count: 0,
        degraded_count: 0,
        outage_count: 0,
        maintenance_count: 0,
        total_count: incidents.len(),
        active_incident_count: 0,
        last_incident_time: None,
        last_updated: now,
    };

    for inc in incidents {
        match inc.status {
            ServiceStatus::Operational => summary.operational_count += 1,
            ServiceStatus::Degraded => summary.degraded_count += 1,
            ServiceStatus::Outage => summary.outage_count += 1,
            ServiceStatus::Maintenance => summary.maintenance_count += 1,
        }
        if inc.is_active {
            summary.active_incident_count += 1;
        }
        if inc.status.priority() > summary.overall_status.priority() {
            summary.overall_status = inc.status;
        }
        if summary.last_incident_time.map_or(true, |t| inc.start_time > t) {
            summary.last_incident_time = Some(inc.start_time);
        }
    }
    summary
}

/// Recompute and overwrite every summary. Returns how many were written.
pub async fn refresh_all(
    store: &dyn IncidentStore,
    catalog: &RegionCatalog,
    now: DateTime<Utc>,
) -> StoreResult<usize> {
    let incidents = store.list_incidents(None).await?;
    let existing = store.get_region_summaries(None).await?;

    let mut resolved: HashSet<(Provider, String)> = HashSet::new();
    for p in Provider::ALL {
        for s in store.resolved_sources(p).await? {
            resolved.insert((p, s));
        }
    }

    // key -> (display name, live incidents)
    let mut groups: BTreeMap<(Provider, String), (String, Vec<&Incident>)> = BTreeMap::new();
    for s in &existing {
        groups
            .entry((s.provider, s.region_id.clone()))
            .or_insert_with(|| (s.region_name.clone(), Vec::new()));
    }
    for inc in &incidents {
        let entry = groups
            .entry((inc.provider, inc.region_id.clone()))
            .or_insert_with(|| (inc.region_name.clone(), Vec::new()));
        if !resolved.contains(&(inc.provider, inc.source_id.clone())) {
            entry.1.push(inc);
        }
    }

    let total = groups.len();
    for ((provider, region_id), (name, live)) in groups {
        let name = if name.is_empty() {
            catalog.resolve_name(provider, &region_id)
        } else {
            name
        };
        let summary = summarize(provider, &region_id, &name, &live, now);
        tracing::debug!(
            target: "aggregate",
            provider = %provider,
            region = %region_id,
            status = ?summary.overall_status,
            active = summary.active_incident_count,
            "region summary"
        );
        store.overwrite_region_summary(summary).await?;
    }

    gauge!("region_summaries_total").set(total as f64);
    tracing::info!(target: "aggregate", summaries = total, "region summaries refreshed");
    Ok(total)
}
