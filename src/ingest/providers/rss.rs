// src/ingest/providers/rss.rs
//! AWS Health and Azure Status RSS. Lifecycle is never present in the wire
//! format, so only title, description, date and region hints are extracted.
//!
//! Items are read field by field off the event stream: markup nested inside
//! a field is flattened to text and entities are decoded afterwards, so one
//! odd item never takes the rest of the channel down with it.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{parse_rfc2822, NormalizedFeed};
use crate::classify::RuleTable;
use crate::error::{IngestError, MalformedItem};
use crate::ingest::normalize_text;
use crate::model::{Provider, RawFeedItem};
use crate::regions::{contains_word, RegionCatalog};

/// Longest `Service:` title prefix accepted as a service name.
const MAX_PREFIX_SERVICE_LEN: usize = 48;

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
    Description,
    Guid,
}

impl Field {
    fn from_tag(local: &[u8]) -> Option<Self> {
        match local {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            b"description" => Some(Field::Description),
            b"guid" => Some(Field::Guid),
            _ => None,
        }
    }
}

/// Raw (still escaped) text of one `<item>`.
#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    pub_date: String,
    description: String,
    guid: String,
}

impl RawItem {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
            Field::Description => &mut self.description,
            Field::Guid => &mut self.guid,
        }
    }
}

/// Walk the document and collect every `<item>` inside a `<channel>`.
fn read_items(provider: Provider, body: &str) -> Result<Vec<RawItem>, IngestError> {
    let payload_err = |reason: String| IngestError::Payload { provider, reason };

    let mut reader = Reader::from_str(body);
    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;
    // Elements opened inside the current field (`<p>`, `<b>` in descriptions).
    let mut nested = 0usize;
    let mut depth = 0usize;
    let mut item_depth = 0usize;
    let mut saw_channel = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            payload_err(format!(
                "parsing rss xml at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name();
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    nested += 1;
                    it.slot(f).push(' ');
                } else if let Some(it) = current.as_mut() {
                    // Only direct children; `<media:title>` and friends are ignored.
                    if depth == item_depth + 1 {
                        field = Field::from_tag(local.as_ref());
                        if let Some(f) = field {
                            it.slot(f).clear();
                        }
                    }
                } else if local.as_ref() == b"item" && saw_channel {
                    current = Some(RawItem::default());
                    item_depth = depth;
                } else if local.as_ref() == b"channel" {
                    saw_channel = true;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if field.is_some() {
                    if nested > 0 {
                        nested -= 1;
                        if let (Some(it), Some(f)) = (current.as_mut(), field) {
                            it.slot(f).push(' ');
                        }
                    } else {
                        field = None;
                    }
                } else if depth + 1 == item_depth && e.local_name().as_ref() == b"item" {
                    if let Some(it) = current.take() {
                        items.push(it);
                    }
                }
            }
            Event::Empty(_) => {
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    it.slot(f).push(' ');
                }
            }
            Event::Text(t) => {
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    it.slot(f).push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::CData(c) => {
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    it.slot(f).push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(payload_err(format!(
            "parsing rss xml: document ends with {depth} unclosed element(s)"
        )));
    }
    if !saw_channel {
        return Err(payload_err("parsing rss xml: no <channel> element".into()));
    }
    Ok(items)
}

/// Entity-decoded, trimmed single-token field (guid, link, date).
fn decode_token(raw: &str) -> String {
    html_escape::decode_html_entities(raw).trim().to_string()
}

pub fn parse(
    provider: Provider,
    body: &str,
    table: &RuleTable,
    catalog: &RegionCatalog,
) -> Result<NormalizedFeed, IngestError> {
    let mut feed = NormalizedFeed::default();
    for (index, it) in read_items(provider, body)?.into_iter().enumerate() {
        let malformed = |reason: &str| MalformedItem {
            provider,
            index,
            reason: reason.to_string(),
        };

        let title = normalize_text(&it.title);
        if title.is_empty() {
            feed.malformed.push(malformed("missing title"));
            continue;
        }

        let guid = decode_token(&it.guid);
        let link = decode_token(&it.link);
        let source_id = if !guid.is_empty() {
            guid
        } else if !link.is_empty() {
            link
        } else {
            feed.malformed.push(malformed("missing guid and link"));
            continue;
        };

        let description = normalize_text(&it.description);
        let region_ids = catalog.hints_from_text(provider, &format!("{title} {description}"));
        let component_names = service_components(table, &title);
        let pub_date = decode_token(&it.pub_date);

        feed.items.push(RawFeedItem {
            provider,
            begin_timestamp: Some(pub_date.as_str())
                .filter(|d| !d.is_empty())
                .and_then(parse_rfc2822),
            end_timestamp: None,
            raw_status: None,
            raw_impact: None,
            raw_severity: None,
            component_names,
            region_ids,
            source_id,
            title,
            description,
        });
    }
    Ok(feed)
}

/// Known service tokens found in the title, then a short `Service:` title
/// prefix, else the generic provider service.
fn service_components(table: &RuleTable, title: &str) -> Vec<String> {
    let lower = title.to_ascii_lowercase();
    let found: Vec<String> = table
        .service_tokens
        .iter()
        .filter(|t| contains_word(&lower, &t.to_ascii_lowercase()))
        .cloned()
        .collect();
    if !found.is_empty() {
        return found;
    }
    match title.split_once(':').map(|(head, _)| head.trim()) {
        Some(head)
            if !head.is_empty()
                && head.chars().count() <= MAX_PREFIX_SERVICE_LEN
                && !head.contains('[') =>
        {
            vec![head.to_string()]
        }
        _ => vec![table.generic_service.clone()],
    }
}
