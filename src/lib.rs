// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod assemble;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod regions;
pub mod retention;
pub mod store;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use crate::api::{create_router, AppState};
pub use crate::classify::Classifier;
pub use crate::config::MonitorConfig;
pub use crate::ingest::{run_cycle, CycleContext, CycleReport};
pub use crate::model::{Incident, Provider, RegionSummary};
pub use crate::store::{InMemoryStore, IncidentStore};

use crate::assemble::IncidentAssembler;
use crate::classify::RuleBook;
use crate::ingest::providers::ProviderFeed;
use crate::ingest::types::StatusFeed;
use crate::regions::RegionCatalog;

/// Classifier and assembler configured from `cfg` (rule overrides, extra regions).
pub fn build_pipeline(cfg: &MonitorConfig) -> (Classifier, IncidentAssembler) {
    let rules = RuleBook::load_or_default(cfg.rules_path.as_deref());
    let classifier = Classifier::new(rules, cfg.classifier.resolved_after_days);

    let mut catalog = RegionCatalog::builtin();
    catalog.extend(&cfg.regions);
    (classifier, IncidentAssembler::new(catalog))
}

/// One HTTP feed per enabled provider, sharing a single client.
pub fn build_http_feeds(cfg: &MonitorConfig) -> Result<Vec<Arc<dyn StatusFeed>>> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.poll.user_agent.clone())
        .timeout(cfg.fetch_timeout())
        .build()
        .context("building http client")?;

    Ok(Provider::ALL
        .into_iter()
        .filter(|p| cfg.feed_enabled(*p))
        .map(|p| {
            Arc::new(ProviderFeed::from_url(p, cfg.feed_url(p), client.clone()))
                as Arc<dyn StatusFeed>
        })
        .collect())
}

/// Store per `cfg`: snapshot-backed when a snapshot path is configured.
pub async fn build_store(cfg: &MonitorConfig) -> Result<Arc<InMemoryStore>> {
    let store = match &cfg.server.snapshot_path {
        Some(path) => InMemoryStore::with_snapshot(path)
            .await
            .with_context(|| format!("opening snapshot {}", path.display()))?,
        None => InMemoryStore::new(),
    };
    Ok(Arc::new(store))
}
