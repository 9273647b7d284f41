// src/ingest/providers/mod.rs
//! Feed normalizers. One parser per wire format; every parser produces the
//! same `RawFeedItem` shape and reports per-item failures instead of failing
//! the whole feed.

pub mod gcp;
pub mod oci;
pub mod rss;

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::classify::RuleTable;
use crate::error::{IngestError, MalformedItem};
use crate::ingest::types::{FeedPayload, StatusFeed};
use crate::model::{Provider, RawFeedItem, GLOBAL_REGION};
use crate::regions::RegionCatalog;

/// Normalizer output for one provider payload.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFeed {
    pub items: Vec<RawFeedItem>,
    pub malformed: Vec<MalformedItem>,
}

/// Parse one payload into `RawFeedItem`s.
///
/// A payload whose root cannot be parsed yields `IngestError::Payload`;
/// individual broken entries are collected in `malformed` and skipped.
pub fn normalize_payload(
    provider: Provider,
    payload: &FeedPayload,
    table: &RuleTable,
    catalog: &RegionCatalog,
) -> Result<NormalizedFeed, IngestError> {
    let expected = provider.content_type();
    if payload.content_type != expected {
        return Err(IngestError::ContentType {
            provider,
            expected,
            actual: payload.content_type,
        });
    }

    let t0 = Instant::now();
    let feed = match provider {
        Provider::Aws | Provider::Azure => rss::parse(provider, &payload.body, table, catalog)?,
        Provider::Gcp => gcp::parse(&payload.body)?,
        Provider::Oci => oci::parse(&payload.body)?,
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms", "provider" => provider.as_str()).record(ms);
    counter!("ingest_items_total", "provider" => provider.as_str())
        .increment(feed.items.len() as u64);
    for m in &feed.malformed {
        tracing::warn!(target: "ingest", provider = %m.provider, index = m.index, reason = %m.reason, "skipping malformed item");
    }
    counter!("ingest_malformed_total", "provider" => provider.as_str())
        .increment(feed.malformed.len() as u64);

    Ok(feed)
}

/// Live or canned source for one provider.
pub struct ProviderFeed {
    provider: Provider,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl ProviderFeed {
    pub fn from_fixture(provider: Provider, body: &str) -> Self {
        Self {
            provider,
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn from_url(provider: Provider, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            provider,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }
}

#[async_trait]
impl StatusFeed for ProviderFeed {
    async fn fetch_latest(&self) -> Result<FeedPayload> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.provider))?;
                resp.error_for_status()
                    .with_context(|| format!("{} http status", self.provider))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.provider))?
            }
        };
        Ok(FeedPayload {
            content_type: self.provider.content_type(),
            body,
        })
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}

pub(crate) fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

pub(crate) fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `(region)` hints from component names; `global` when none carry one.
pub(crate) fn component_regions<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if let Some(id) = crate::regions::parenthesized_region(name) {
            push_unique(&mut out, id);
        }
    }
    out
}

pub(crate) fn push_unique(out: &mut Vec<String>, id: String) {
    if !out.contains(&id) {
        out.push(id);
    }
}

pub(crate) fn or_global(mut regions: Vec<String>) -> Vec<String> {
    if regions.is_empty() {
        regions.push(GLOBAL_REGION.to_string());
    }
    regions
}
