//! Incident persistence seam. The pipeline, aggregator, retention job and API
//! only ever talk to `dyn IncidentStore`.

pub mod memory;

pub use memory::InMemoryStore;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::model::{Incident, IncidentKey, Provider, RegionSummary, ServiceStatus};

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Insert unless `(provider, source_id, region_id)` already exists or was
    /// retired. Returns `false` for a duplicate; that is not an error. A
    /// retired key has its marker refreshed to `incident.last_updated`.
    async fn upsert_incident(&self, incident: Incident) -> StoreResult<bool>;

    /// Source ids already stored for one region.
    async fn bulk_read_incident_keys(
        &self,
        provider: Provider,
        region_id: &str,
    ) -> StoreResult<HashSet<String>>;

    /// Record that `source_id` was seen resolved at `seen_at`. Returns `false`
    /// if it was already recorded; the timestamp is refreshed either way.
    async fn mark_resolved(
        &self,
        provider: Provider,
        source_id: &str,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Forget a resolution because the source is active again. Returns
    /// whether one was recorded.
    async fn clear_resolved(&self, provider: Provider, source_id: &str) -> StoreResult<bool>;

    async fn resolved_sources(&self, provider: Provider) -> StoreResult<HashSet<String>>;

    async fn list_incidents(&self, provider: Option<Provider>) -> StoreResult<Vec<Incident>>;

    /// Hard delete. Returns how many rows were actually removed; the keys may
    /// be inserted again later.
    async fn delete_incidents(&self, keys: &[IncidentKey]) -> StoreResult<usize>;

    /// Delete rows and keep a marker per key so a feed that still lists them
    /// does not insert them again. Returns how many rows were removed.
    async fn retire_incidents(
        &self,
        keys: &[IncidentKey],
        at: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Drop retirement and resolution markers last seen before `cutoff`.
    /// Resolution markers that still match a stored row are kept.
    async fn prune_markers(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    async fn overwrite_region_summary(&self, summary: RegionSummary) -> StoreResult<()>;

    async fn get_region_summaries(
        &self,
        provider: Option<Provider>,
    ) -> StoreResult<Vec<RegionSummary>>;

    /// Persist buffered state, if the backend has any.
    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Active, non-operational incidents not superseded by a resolution,
    /// newest first.
    async fn get_active_incidents(
        &self,
        provider: Option<Provider>,
        region_id: Option<&str>,
    ) -> StoreResult<Vec<Incident>> {
        let mut resolved: HashSet<(Provider, String)> = HashSet::new();
        let providers: Vec<Provider> = match provider {
            Some(p) => vec![p],
            None => Provider::ALL.to_vec(),
        };
        for p in providers {
            for s in self.resolved_sources(p).await? {
                resolved.insert((p, s));
            }
        }

        let mut out: Vec<Incident> = self
            .list_incidents(provider)
            .await?
            .into_iter()
            .filter(|i| i.is_active && i.status != ServiceStatus::Operational)
            .filter(|i| region_id.map_or(true, |r| i.region_id == r))
            .filter(|i| !resolved.contains(&(i.provider, i.source_id.clone())))
            .collect();
        out.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(out)
    }
}
