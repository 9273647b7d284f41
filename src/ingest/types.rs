// src/ingest/types.rs
use crate::model::{ContentType, Provider};
use anyhow::Result;

/// Raw bytes of one provider endpoint plus the declared format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPayload {
    pub content_type: ContentType,
    pub body: String,
}

impl FeedPayload {
    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Xml,
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Json,
            body: body.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait StatusFeed: Send + Sync {
    async fn fetch_latest(&self) -> Result<FeedPayload>;
    fn provider(&self) -> Provider;
}
