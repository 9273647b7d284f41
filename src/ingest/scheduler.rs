// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::{run_cycle, types::StatusFeed, CycleContext, CycleReport};
use crate::retention::{apply_retention, RetentionPolicy};

#[derive(Clone, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub retention: RetentionPolicy,
}

/// One scheduler tick: cycle, retention, rollup again if rows were removed,
/// then flush the store.
pub async fn run_tick(
    feeds: &[Arc<dyn StatusFeed>],
    ctx: &CycleContext,
    retention: &RetentionPolicy,
) -> CycleReport {
    let now = chrono::Utc::now();
    let mut report = run_cycle(feeds, ctx, now).await;

    match apply_retention(ctx.store.as_ref(), retention, now).await {
        Ok(r) if r.removed() > 0 => {
            match crate::aggregate::refresh_all(ctx.store.as_ref(), ctx.assembler.catalog(), now)
                .await
            {
                Ok(n) => report.summaries = n,
                Err(e) => tracing::warn!(target: "aggregate", error = %e, "region rollup failed"),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(target: "retention", error = %e, "retention failed"),
    }

    if let Err(e) = ctx.store.flush().await {
        tracing::warn!(target: "store", error = %e, "store flush failed");
    }
    counter!("cycle_runs_total").increment(1);
    report
}

/// Spawn the polling loop. The first tick fires immediately.
pub fn spawn_scheduler(
    cfg: SchedulerCfg,
    feeds: Vec<Arc<dyn StatusFeed>>,
    ctx: CycleContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = run_tick(&feeds, &ctx, &cfg.retention).await;
            let skipped: Vec<String> = report
                .providers
                .iter()
                .filter(|p| p.error.is_some())
                .map(|p| p.provider.to_string())
                .collect();
            tracing::info!(
                target: "ingest",
                inserted = report.inserted(),
                summaries = report.summaries,
                skipped = ?skipped,
                "scheduler tick"
            );
        }
    })
}
