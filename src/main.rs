//! Cloud Status Monitor: binary entrypoint
//! Polls provider status feeds on a schedule and serves the dashboard API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cloud_status_monitor::ingest::scheduler::{run_tick, spawn_scheduler, SchedulerCfg};
use cloud_status_monitor::metrics::Metrics;
use cloud_status_monitor::{
    build_http_feeds, build_pipeline, build_store, create_router, AppState, CycleContext,
    IncidentStore, MonitorConfig,
};

const DEFAULT_LOG_FILTER: &str =
    "cloud_status_monitor=info,ingest=info,aggregate=info,retention=info,store=info,classify=warn,warn";

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = MonitorConfig::load_default().context("loading monitor config")?;
    let (classifier, assembler) = build_pipeline(&cfg);
    let store = build_store(&cfg).await?;
    let feeds = build_http_feeds(&cfg)?;

    let ctx = CycleContext {
        classifier: Arc::new(classifier),
        assembler: Arc::new(assembler),
        store: store.clone(),
        fetch_timeout: cfg.fetch_timeout(),
    };

    let run_once = std::env::var("MONITOR_RUN_ONCE")
        .ok()
        .is_some_and(|v| v == "1");
    if run_once {
        let report = run_tick(&feeds, &ctx, &cfg.retention.policy()).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let metrics = Metrics::init(cfg.poll.interval_secs)?;
    let feed_count = feeds.len();
    let _scheduler = spawn_scheduler(
        SchedulerCfg {
            interval: cfg.poll_interval(),
            retention: cfg.retention.policy(),
        },
        feeds,
        ctx,
    );

    let state = AppState {
        store: store.clone() as Arc<dyn IncidentStore>,
    };
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(bind = %cfg.server.bind, feeds = feed_count, "cloud status monitor listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server")?;

    if let Err(e) = store.flush().await {
        tracing::warn!(target: "store", error = %e, "final snapshot failed");
    }
    Ok(())
}
