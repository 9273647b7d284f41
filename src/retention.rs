//! Periodic cleanup of the incident table.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::StoreResult;
use crate::model::{window_days, Incident, IncidentKey, Provider, ServiceStatus};
use crate::store::IncidentStore;

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    pub drop_operational: bool,
    pub max_active_per_provider: usize,
    pub archive_after: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            drop_operational: true,
            max_active_per_provider: 50,
            archive_after: window_days(90),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetentionReport {
    pub operational_removed: usize,
    pub truncated: BTreeMap<Provider, usize>,
    pub archived: usize,
    /// Retirement and resolution markers that aged out.
    pub markers_pruned: usize,
    pub remaining: usize,
}

impl RetentionReport {
    /// Incident rows removed by this run.
    pub fn removed(&self) -> usize {
        self.operational_removed + self.truncated.values().sum::<usize>() + self.archived
    }
}

/// Apply the policy in three passes: operational rows, then the per-provider
/// active cap (newest `start_time` kept), then archival of stale inactive or
/// superseded rows. A row is only ever counted by the first pass that drops it.
///
/// Rows dropped by the first two passes are still listed upstream, so they are
/// retired rather than deleted and later cycles skip them as duplicates.
/// Markers not seen since the archive cutoff are pruned last.
pub async fn apply_retention(
    store: &dyn IncidentStore,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> StoreResult<RetentionReport> {
    let incidents = store.list_incidents(None).await?;
    let mut resolved: HashSet<(Provider, String)> = HashSet::new();
    for p in Provider::ALL {
        for s in store.resolved_sources(p).await? {
            resolved.insert((p, s));
        }
    }
    let superseded = |i: &Incident| resolved.contains(&(i.provider, i.source_id.clone()));

    let mut report = RetentionReport::default();
    let mut retire: HashSet<IncidentKey> = HashSet::new();

    if policy.drop_operational {
        for i in incidents.iter().filter(|i| i.status == ServiceStatus::Operational) {
            if retire.insert(i.key()) {
                report.operational_removed += 1;
            }
        }
    }

    for p in Provider::ALL {
        let mut active: Vec<&Incident> = incidents
            .iter()
            .filter(|i| i.provider == p && i.is_active && !superseded(*i))
            .filter(|i| !retire.contains(&i.key()))
            .collect();
        if active.len() <= policy.max_active_per_provider {
            continue;
        }
        active.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then(b.last_updated.cmp(&a.last_updated))
        });
        let dropped = active.len() - policy.max_active_per_provider;
        for i in active.into_iter().skip(policy.max_active_per_provider) {
            retire.insert(i.key());
        }
        report.truncated.insert(p, dropped);
    }

    // A window reaching past the earliest representable instant archives nothing.
    let cutoff = now.checked_sub_signed(policy.archive_after);
    let mut archive: Vec<IncidentKey> = Vec::new();
    if let Some(cutoff) = cutoff {
        for i in &incidents {
            let key = i.key();
            if (!i.is_active || superseded(i)) && i.last_updated < cutoff && !retire.contains(&key)
            {
                archive.push(key);
            }
        }
    }
    report.archived = archive.len();

    let retire: Vec<IncidentKey> = retire.into_iter().collect();
    let removed = store.retire_incidents(&retire, now).await?
        + store.delete_incidents(&archive).await?;
    report.remaining = incidents.len().saturating_sub(removed);

    if let Some(cutoff) = cutoff {
        report.markers_pruned = store.prune_markers(cutoff).await?;
    }

    tracing::info!(
        target: "retention",
        operational = report.operational_removed,
        truncated = report.truncated.values().sum::<usize>(),
        archived = report.archived,
        markers_pruned = report.markers_pruned,
        remaining = report.remaining,
        "retention applied"
    );
    Ok(report)
}
