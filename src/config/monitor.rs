// src/config/monitor.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::classify::DEFAULT_RESOLVED_AFTER_DAYS;
use crate::model::{window_days, Provider, MAX_WINDOW_DAYS};
use crate::retention::RetentionPolicy;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

fn default_interval_secs() -> u64 {
    300
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    concat!("cloud-status-monitor/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Undated-lifecycle items older than this are treated as resolved.
    pub resolved_after_days: i64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            resolved_after_days: DEFAULT_RESOLVED_AFTER_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    pub drop_operational: bool,
    pub max_active_per_provider: usize,
    pub archive_after_days: i64,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            drop_operational: true,
            max_active_per_provider: 50,
            archive_after_days: 90,
        }
    }
}

impl RetentionSection {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            drop_operational: self.drop_operational,
            max_active_per_provider: self.max_active_per_provider,
            archive_after: window_days(self.archive_after_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// JSON snapshot of the store; `None` keeps everything in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            snapshot_path: Some(PathBuf::from("data/snapshot.json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub classifier: ClassifierSection,
    pub poll: PollSection,
    pub retention: RetentionSection,
    pub server: ServerSection,
    pub feeds: HashMap<Provider, FeedSection>,
    /// Extra `id = "Display name"` entries merged into the region catalog.
    pub regions: HashMap<Provider, BTreeMap<String, String>>,
    /// Optional TOML/JSON override of the built-in rule tables.
    pub rules_path: Option<PathBuf>,
}

/// Public status endpoints polled when no URL is configured.
pub fn default_feed_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Aws => "https://status.aws.amazon.com/rss/all.rss",
        Provider::Azure => "https://azure.status.microsoft/en-us/status/feed/",
        Provider::Gcp => "https://status.cloud.google.com/incidents.json",
        Provider::Oci => "https://ocistatus.oraclecloud.com/api/v2/incidents.json",
    }
}

impl MonitorConfig {
    /// Load from an explicit TOML file, then sanitize.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let mut cfg: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH
    /// 2) config/monitor.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }

    pub fn feed_enabled(&self, provider: Provider) -> bool {
        self.feeds.get(&provider).map_or(true, |f| f.enabled)
    }

    pub fn feed_url(&self, provider: Provider) -> String {
        self.feeds
            .get(&provider)
            .and_then(|f| f.url.clone())
            .unwrap_or_else(|| default_feed_url(provider).to_string())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll.interval_secs)
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll.fetch_timeout_secs)
    }

    fn sanitize(&mut self) {
        if self.poll.interval_secs == 0 {
            self.poll.interval_secs = default_interval_secs();
        }
        if self.poll.fetch_timeout_secs == 0 {
            self.poll.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.poll.user_agent.trim().is_empty() {
            self.poll.user_agent = default_user_agent();
        }
        if self.classifier.resolved_after_days < 0 {
            self.classifier.resolved_after_days = DEFAULT_RESOLVED_AFTER_DAYS;
        }
        self.classifier.resolved_after_days =
            self.classifier.resolved_after_days.min(MAX_WINDOW_DAYS);
        if self.retention.archive_after_days <= 0 {
            self.retention.archive_after_days = RetentionSection::default().archive_after_days;
        }
        self.retention.archive_after_days = self.retention.archive_after_days.min(MAX_WINDOW_DAYS);
        if self.server.bind.trim().is_empty() {
            self.server.bind = default_bind();
        }
        for f in self.feeds.values_mut() {
            if f.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                f.url = None;
            }
        }
    }
}
