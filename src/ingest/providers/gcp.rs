// src/ingest/providers/gcp.rs
//! Google Cloud `incidents.json`: a JSON array of incident objects.

use serde::Deserialize;
use serde_json::Value;

use super::{component_regions, or_global, parse_rfc3339, push_unique, NormalizedFeed};
use crate::error::{IngestError, MalformedItem};
use crate::ingest::normalize_text;
use crate::model::{Provider, RawFeedItem};
use crate::regions::strip_parenthesized;

#[derive(Debug, Deserialize)]
struct GcpIncident {
    id: String,
    #[serde(default)]
    external_desc: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    begin: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    status_impact: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    affected_products: Option<Vec<Product>>,
    #[serde(default)]
    currently_affected_locations: Option<Vec<Location>>,
    #[serde(default)]
    most_recent_update: Option<Update>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Location {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    text: String,
}

pub fn parse(body: &str) -> Result<NormalizedFeed, IngestError> {
    let provider = Provider::Gcp;
    let root: Value = serde_json::from_str(body).map_err(|e| IngestError::Payload {
        provider,
        reason: format!("parsing incidents json: {e}"),
    })?;
    let Value::Array(entries) = root else {
        return Err(IngestError::Payload {
            provider,
            reason: "expected a top-level array".to_string(),
        });
    };

    let mut feed = NormalizedFeed::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match incident_to_item(entry) {
            Ok(item) => feed.items.push(item),
            Err(reason) => feed.malformed.push(MalformedItem {
                provider,
                index,
                reason,
            }),
        }
    }
    Ok(feed)
}

fn incident_to_item(entry: Value) -> Result<RawFeedItem, String> {
    let inc: GcpIncident = serde_json::from_value(entry).map_err(|e| e.to_string())?;
    if inc.id.trim().is_empty() {
        return Err("empty id".into());
    }

    let title = normalize_text(
        inc.external_desc
            .as_deref()
            .or(inc.summary.as_deref())
            .unwrap_or_default(),
    );
    if title.is_empty() {
        return Err("missing external_desc".into());
    }

    // A present but unreadable `end` must not turn an ended incident active.
    let end_timestamp = match inc.end.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_rfc3339(raw).ok_or_else(|| format!("unparseable end `{raw}`"))?),
        None => None,
    };

    let products = inc.affected_products.unwrap_or_default();
    let mut region_ids = component_regions(products.iter().map(|p| p.title.as_str()));
    for loc in inc.currently_affected_locations.unwrap_or_default() {
        let id = loc.id.trim().to_ascii_lowercase();
        if !id.is_empty() {
            push_unique(&mut region_ids, id);
        }
    }

    let component_names = products
        .iter()
        .map(|p| strip_parenthesized(&p.title))
        .filter(|n| !n.is_empty())
        .collect();

    let description = inc
        .most_recent_update
        .map(|u| normalize_text(&u.text))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| title.clone());

    Ok(RawFeedItem {
        provider: Provider::Gcp,
        source_id: inc.id,
        title,
        description,
        raw_status: None,
        raw_impact: inc.status_impact,
        raw_severity: inc.severity,
        begin_timestamp: inc.begin.as_deref().and_then(parse_rfc3339),
        end_timestamp,
        component_names,
        region_ids: or_global(region_ids),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_products_locations_and_end() {
        let body = r#"[
          {"id":"a1","external_desc":"Cloud SQL connection errors","begin":"2025-03-10T10:00:00+00:00",
           "end":null,"status_impact":"SERVICE_OUTAGE","severity":"high",
           "affected_products":[{"title":"Cloud SQL (us-central1)"},{"title":"BigQuery"}],
           "currently_affected_locations":[{"id":"europe-west1","title":"Belgium"}],
           "most_recent_update":{"text":"Engineers are working on it."}},
          {"id":"a2","external_desc":"Old thing","end":"2025-03-09T10:00:00Z"}
        ]"#;
        let feed = parse(body).unwrap();
        assert!(feed.malformed.is_empty());

        let a1 = &feed.items[0];
        assert_eq!(a1.region_ids, vec!["us-central1", "europe-west1"]);
        assert_eq!(a1.component_names, vec!["Cloud SQL", "BigQuery"]);
        assert_eq!(a1.raw_impact.as_deref(), Some("SERVICE_OUTAGE"));
        assert_eq!(a1.description, "Engineers are working on it.");
        assert!(a1.end_timestamp.is_none());

        let a2 = &feed.items[1];
        assert!(a2.end_timestamp.is_some());
        assert_eq!(a2.region_ids, vec!["global"]);
        assert_eq!(a2.description, "Old thing");
    }

    #[test]
    fn bad_entries_are_skipped_individually() {
        let body = r#"[
          {"external_desc":"no id"},
          {"id":"b2","external_desc":"bad end","end":"not a date"},
          {"id":"b3","external_desc":"fine"},
          42
        ]"#;
        let feed = parse(body).unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].source_id, "b3");
        let skipped: Vec<usize> = feed.malformed.iter().map(|m| m.index).collect();
        assert_eq!(skipped, vec![0, 1, 3]);
    }

    #[test]
    fn non_array_root_fails_payload() {
        assert!(matches!(parse("{}"), Err(IngestError::Payload { .. })));
        assert!(matches!(parse("not json"), Err(IngestError::Payload { .. })));
    }
}
