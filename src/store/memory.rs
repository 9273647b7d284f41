use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IncidentStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{Incident, IncidentKey, Provider, RegionSummary};

/// In-memory store with optional JSON snapshot persistence.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct State {
    incidents: BTreeMap<IncidentKey, Incident>,
    /// `(provider, source_id)` → last time the source was seen resolved.
    resolved: HashMap<(Provider, String), DateTime<Utc>>,
    /// Keys removed by retention → last time a feed asserted them.
    retired: BTreeMap<IncidentKey, DateTime<Utc>>,
    summaries: BTreeMap<(Provider, String), RegionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResolvedMarker {
    provider: Provider,
    source_id: String,
    seen_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RetiredMarker {
    #[serde(flatten)]
    key: IncidentKey,
    seen_at: DateTime<Utc>,
}

/// On-disk layout; maps with struct keys are not valid JSON objects.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    incidents: Vec<Incident>,
    #[serde(default)]
    resolved: Vec<ResolvedMarker>,
    #[serde(default)]
    retired: Vec<RetiredMarker>,
    #[serde(default)]
    summaries: Vec<RegionSummary>,
}

impl From<&State> for Snapshot {
    fn from(s: &State) -> Self {
        let mut resolved: Vec<ResolvedMarker> = s
            .resolved
            .iter()
            .map(|((provider, source_id), seen_at)| ResolvedMarker {
                provider: *provider,
                source_id: source_id.clone(),
                seen_at: *seen_at,
            })
            .collect();
        resolved.sort_by(|a, b| (a.provider, &a.source_id).cmp(&(b.provider, &b.source_id)));
        Self {
            incidents: s.incidents.values().cloned().collect(),
            resolved,
            retired: s
                .retired
                .iter()
                .map(|(key, seen_at)| RetiredMarker {
                    key: key.clone(),
                    seen_at: *seen_at,
                })
                .collect(),
            summaries: s.summaries.values().cloned().collect(),
        }
    }
}

impl From<Snapshot> for State {
    fn from(s: Snapshot) -> Self {
        Self {
            incidents: s.incidents.into_iter().map(|i| (i.key(), i)).collect(),
            resolved: s
                .resolved
                .into_iter()
                .map(|m| ((m.provider, m.source_id), m.seen_at))
                .collect(),
            retired: s.retired.into_iter().map(|m| (m.key, m.seen_at)).collect(),
            summaries: s
                .summaries
                .into_iter()
                .map(|r| ((r.provider, r.region_id.clone()), r))
                .collect(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that restores from `path` if it exists and saves there on `flush`.
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let snap: Snapshot = serde_json::from_str(&raw)?;
                tracing::info!(target: "store", path = %path.display(), incidents = snap.incidents.len(), "restored snapshot");
                State::from(snap)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
        })
    }

    /// Write the current state as pretty JSON, creating parent dirs.
    pub async fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let json = {
            let state = self.read()?;
            serde_json::to_string_pretty(&Snapshot::from(&*state))?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(target: "store", path = %path.display(), "snapshot saved");
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("state lock poisoned".into()))
    }
}

#[async_trait]
impl IncidentStore for InMemoryStore {
    async fn upsert_incident(&self, incident: Incident) -> StoreResult<bool> {
        let key = incident.key();
        let mut state = self.write()?;
        if let Some(seen) = state.retired.get_mut(&key) {
            *seen = (*seen).max(incident.last_updated);
            tracing::debug!(target: "store", provider = %key.provider, source_id = %key.source_id, region = %key.region_id, "retired incident still listed");
            return Ok(false);
        }
        if state.incidents.contains_key(&key) {
            tracing::debug!(target: "store", provider = %key.provider, source_id = %key.source_id, region = %key.region_id, "duplicate incident");
            return Ok(false);
        }
        state.incidents.insert(key, incident);
        Ok(true)
    }

    async fn bulk_read_incident_keys(
        &self,
        provider: Provider,
        region_id: &str,
    ) -> StoreResult<HashSet<String>> {
        let state = self.read()?;
        Ok(state
            .incidents
            .keys()
            .filter(|k| k.provider == provider && k.region_id == region_id)
            .map(|k| k.source_id.clone())
            .collect())
    }

    async fn mark_resolved(
        &self,
        provider: Provider,
        source_id: &str,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.resolved.entry((provider, source_id.to_string())) {
            Entry::Occupied(mut e) => {
                let prev = e.get_mut();
                *prev = (*prev).max(seen_at);
                Ok(false)
            }
            Entry::Vacant(e) => {
                e.insert(seen_at);
                Ok(true)
            }
        }
    }

    async fn clear_resolved(&self, provider: Provider, source_id: &str) -> StoreResult<bool> {
        let mut state = self.write()?;
        Ok(state
            .resolved
            .remove(&(provider, source_id.to_string()))
            .is_some())
    }

    async fn resolved_sources(&self, provider: Provider) -> StoreResult<HashSet<String>> {
        let state = self.read()?;
        Ok(state
            .resolved
            .keys()
            .filter(|(p, _)| *p == provider)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn list_incidents(&self, provider: Option<Provider>) -> StoreResult<Vec<Incident>> {
        let state = self.read()?;
        Ok(state
            .incidents
            .values()
            .filter(|i| provider.map_or(true, |p| i.provider == p))
            .cloned()
            .collect())
    }

    async fn delete_incidents(&self, keys: &[IncidentKey]) -> StoreResult<usize> {
        let mut state = self.write()?;
        Ok(keys
            .iter()
            .filter(|k| state.incidents.remove(*k).is_some())
            .count())
    }

    async fn retire_incidents(
        &self,
        keys: &[IncidentKey],
        at: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut state = self.write()?;
        let mut removed = 0;
        for key in keys {
            if state.incidents.remove(key).is_some() {
                removed += 1;
                state.retired.insert(key.clone(), at);
            }
        }
        Ok(removed)
    }

    async fn prune_markers(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut state = self.write()?;
        let State {
            incidents,
            resolved,
            retired,
            ..
        } = &mut *state;

        let before = resolved.len() + retired.len();
        retired.retain(|_, seen| *seen >= cutoff);
        let live: HashSet<(Provider, &str)> = incidents
            .keys()
            .map(|k| (k.provider, k.source_id.as_str()))
            .collect();
        resolved.retain(|(p, id), seen| *seen >= cutoff || live.contains(&(*p, id.as_str())));
        Ok(before - (resolved.len() + retired.len()))
    }

    async fn overwrite_region_summary(&self, summary: RegionSummary) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .summaries
            .insert((summary.provider, summary.region_id.clone()), summary);
        Ok(())
    }

    async fn get_region_summaries(
        &self,
        provider: Option<Provider>,
    ) -> StoreResult<Vec<RegionSummary>> {
        let state = self.read()?;
        Ok(state
            .summaries
            .values()
            .filter(|s| provider.map_or(true, |p| s.provider == p))
            .cloned()
            .collect())
    }

    async fn flush(&self) -> StoreResult<()> {
        match &self.snapshot_path {
            Some(path) => self.save_snapshot(path).await,
            None => Ok(()),
        }
    }
}
