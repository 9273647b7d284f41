// src/ingest/providers/oci.rs
//! Oracle Cloud status page JSON: `{ "incidents": [...] }` with structured
//! `status` / `impact` fields.

use serde::Deserialize;
use serde_json::Value;

use super::{component_regions, or_global, parse_rfc3339, NormalizedFeed};
use crate::error::{IngestError, MalformedItem};
use crate::ingest::normalize_text;
use crate::model::{Provider, RawFeedItem};
use crate::regions::strip_parenthesized;

#[derive(Debug, Deserialize)]
struct OciIncident {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    resolved_at: Option<String>,
    #[serde(default)]
    components: Option<Vec<Component>>,
    #[serde(default)]
    incident_updates: Option<Vec<Update>>,
}

#[derive(Debug, Deserialize)]
struct Component {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    body: String,
}

pub fn parse(body: &str) -> Result<NormalizedFeed, IngestError> {
    let provider = Provider::Oci;
    let root: Value = serde_json::from_str(body).map_err(|e| IngestError::Payload {
        provider,
        reason: format!("parsing status json: {e}"),
    })?;
    let Value::Object(mut root) = root else {
        return Err(IngestError::Payload {
            provider,
            reason: "expected a top-level object".to_string(),
        });
    };

    // Status-only documents carry no incidents list at all.
    let entries = match root.remove("incidents") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(v)) => v,
        Some(_) => {
            return Err(IngestError::Payload {
                provider,
                reason: "`incidents` is not an array".to_string(),
            })
        }
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
    let inc: OciIncident = serde_json::from_value(entry).map_err(|e| e.to_string())?;
    if inc.id.trim().is_empty() {
        return Err("empty id".into());
    }
    let title = normalize_text(&inc.name);
    if title.is_empty() {
        return Err("empty name".into());
    }

    let components = inc.components.unwrap_or_default();
    let region_ids = or_global(component_regions(components.iter().map(|c| c.name.as_str())));
    let component_names = components
        .iter()
        .map(|c| strip_parenthesized(&c.name))
        .filter(|n| !n.is_empty())
        .collect();

    let description = inc
        .incident_updates
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|u| normalize_text(&u.body))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| title.clone());

    // `started_at` is only consulted for entries that carry no `created_at`.
    let begin_timestamp = inc
        .created_at
        .as_deref()
        .and_then(parse_rfc3339)
        .or_else(|| inc.started_at.as_deref().and_then(parse_rfc3339));

    Ok(RawFeedItem {
        provider: Provider::Oci,
        source_id: inc.id,
        title,
        description,
        raw_status: inc.status,
        raw_impact: inc.impact,
        raw_severity: None,
        begin_timestamp,
        end_timestamp: inc.resolved_at.as_deref().and_then(parse_rfc3339),
        component_names,
        region_ids,
    })
}
