// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::assemble::IncidentAssembler;
use crate::classify::Classifier;
use crate::error::IngestError;
use crate::ingest::types::{FeedPayload, StatusFeed};
use crate::model::{Incident, LifecycleState, Provider};
use crate::store::IncidentStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Feed items normalized, per provider.");
        describe_counter!(
            "ingest_malformed_total",
            "Feed items skipped as malformed, per provider."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse failures that skipped a cycle."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_counter!(
            "classify_excluded_total",
            "Items that never became incidents (resolved, informational, operational)."
        );
        describe_counter!("incidents_inserted_total", "New incident rows stored.");
        describe_counter!(
            "incidents_duplicate_total",
            "Incident rows skipped because the key already existed."
        );
        describe_gauge!("region_summaries_total", "Region summaries after the last rollup.");
        describe_gauge!("cycle_last_run_ts", "Unix ts when a polling cycle last finished.");
        describe_counter!("cycle_runs_total", "Scheduler ticks completed.");
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 2000 chars
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

/// Everything a polling cycle needs besides the feeds themselves.
#[derive(Clone)]
pub struct CycleContext {
    pub classifier: Arc<Classifier>,
    pub assembler: Arc<IncidentAssembler>,
    pub store: Arc<dyn IncidentStore>,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderReport {
    pub provider: Provider,
    pub items: usize,
    pub malformed: usize,
    pub excluded: usize,
    pub resolved_marked: usize,
    /// Earlier resolutions withdrawn because the source is active again.
    pub reopened: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Set when the provider was skipped for this cycle.
    pub error: Option<String>,
}

impl ProviderReport {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            items: 0,
            malformed: 0,
            excluded: 0,
            resolved_marked: 0,
            reopened: 0,
            inserted: 0,
            duplicates: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub providers: Vec<ProviderReport>,
    pub summaries: usize,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn inserted(&self) -> usize {
        self.providers.iter().map(|p| p.inserted).sum()
    }

    pub fn provider(&self, provider: Provider) -> Option<&ProviderReport> {
        self.providers.iter().find(|p| p.provider == provider)
    }
}

/// Run one polling cycle: every feed in its own task, then one aggregation
/// pass once all of them have finished. Never fails as a whole.
pub async fn run_cycle(
    feeds: &[Arc<dyn StatusFeed>],
    ctx: &CycleContext,
    now: DateTime<Utc>,
) -> CycleReport {
    ensure_metrics_described();

    let mut set = JoinSet::new();
    for feed in feeds {
        let feed = Arc::clone(feed);
        let ctx = ctx.clone();
        set.spawn(async move { process_provider(feed.as_ref(), &ctx, now).await });
    }

    let mut providers = Vec::with_capacity(feeds.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(report) => providers.push(report),
            Err(e) => tracing::error!(target: "ingest", error = %e, "provider task aborted"),
        }
    }
    providers.sort_by_key(|r| r.provider);

    let summaries =
        match crate::aggregate::refresh_all(ctx.store.as_ref(), ctx.assembler.catalog(), now)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(target: "aggregate", error = %e, "region rollup failed");
                0
            }
        };

    gauge!("cycle_last_run_ts").set(now.timestamp() as f64);
    let report = CycleReport {
        providers,
        summaries,
        finished_at: now,
    };
    tracing::info!(
        target: "ingest",
        inserted = report.inserted(),
        summaries = report.summaries,
        "polling cycle finished"
    );
    report
}

async fn fetch_with_timeout(
    feed: &dyn StatusFeed,
    timeout: Duration,
) -> Result<FeedPayload, IngestError> {
    let provider = feed.provider();
    match tokio::time::timeout(timeout, feed.fetch_latest()).await {
        Ok(Ok(payload)) => Ok(payload),
        Ok(Err(e)) => Err(IngestError::Fetch {
            provider,
            reason: format!("{e:#}"),
        }),
        Err(_) => Err(IngestError::Timeout {
            provider,
            after: timeout,
        }),
    }
}

async fn process_provider(
    feed: &dyn StatusFeed,
    ctx: &CycleContext,
    now: DateTime<Utc>,
) -> ProviderReport {
    let provider = feed.provider();
    let mut report = ProviderReport::new(provider);

    let normalized = match fetch_with_timeout(feed, ctx.fetch_timeout).await.and_then(|payload| {
        providers::normalize_payload(
            provider,
            &payload,
            ctx.classifier.rules().table(provider),
            ctx.assembler.catalog(),
        )
    }) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(target: "ingest", provider = %provider, error = %e, "provider skipped this cycle");
            counter!("ingest_provider_errors_total", "provider" => provider.as_str()).increment(1);
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.items = normalized.items.len();
    report.malformed = normalized.malformed.len();

    let table = ctx.classifier.rules().table(provider);
    let mut candidates: Vec<Incident> = Vec::new();
    for item in &normalized.items {
        let result = ctx.classifier.classify(item, now);
        tracing::debug!(
            target: "classify",
            provider = %provider,
            source_id = %item.source_id,
            lifecycle = ?result.lifecycle_state,
            severity = ?result.severity,
            status = ?result.status,
            "classified"
        );

        match result.lifecycle_state {
            LifecycleState::Resolved => {
                match ctx.store.mark_resolved(provider, &item.source_id, now).await {
                    Ok(true) => report.resolved_marked += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(target: "store", provider = %provider, error = %e, "mark_resolved failed")
                    }
                }
            }
            LifecycleState::Active => match ctx.store.clear_resolved(provider, &item.source_id).await {
                Ok(true) => {
                    report.reopened += 1;
                    tracing::info!(target: "ingest", provider = %provider, source_id = %item.source_id, "resolution withdrawn");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(target: "store", provider = %provider, error = %e, "clear_resolved failed")
                }
            },
            LifecycleState::Unknown => {}
        }
        if result.is_excluded() {
            report.excluded += 1;
            continue;
        }
        candidates.extend(ctx.assembler.assemble(table, item, &result, now));
    }
    counter!("classify_excluded_total", "provider" => provider.as_str())
        .increment(report.excluded as u64);

    // Check-then-insert: one bulk key read per region, the store arbitrates races.
    let mut known: HashMap<String, HashSet<String>> = HashMap::new();
    for incident in candidates {
        if !known.contains_key(&incident.region_id) {
            let keys = match ctx
                .store
                .bulk_read_incident_keys(provider, &incident.region_id)
                .await
            {
                Ok(keys) => keys,
                Err(e) => {
                    tracing::warn!(target: "store", provider = %provider, error = %e, "bulk key read failed");
                    HashSet::new()
                }
            };
            known.insert(incident.region_id.clone(), keys);
        }
        let seen = known.entry(incident.region_id.clone()).or_default();
        if seen.contains(&incident.source_id) {
            report.duplicates += 1;
            continue;
        }

        let source_id = incident.source_id.clone();
        match ctx.store.upsert_incident(incident).await {
            Ok(true) => {
                report.inserted += 1;
                seen.insert(source_id);
            }
            Ok(false) => report.duplicates += 1,
            Err(e) => {
                tracing::warn!(target: "store", provider = %provider, error = %e, "incident insert failed")
            }
        }
    }

    counter!("incidents_inserted_total", "provider" => provider.as_str())
        .increment(report.inserted as u64);
    counter!("incidents_duplicate_total", "provider" => provider.as_str())
        .increment(report.duplicates as u64);
    tracing::info!(
        target: "ingest",
        provider = %provider,
        items = report.items,
        malformed = report.malformed,
        excluded = report.excluded,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "provider processed"
    );
    report
}
