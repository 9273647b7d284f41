//! Error types for feed ingestion and the incident store.

use crate::model::{ContentType, Provider};
use thiserror::Error;

/// Failures that abandon one provider for the current polling cycle.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{provider}: fetch failed: {reason}")]
    Fetch { provider: Provider, reason: String },

    #[error("{provider}: fetch timed out after {after:?}")]
    Timeout {
        provider: Provider,
        after: std::time::Duration,
    },

    #[error("{provider}: payload could not be parsed: {reason}")]
    Payload { provider: Provider, reason: String },

    #[error("{provider}: expected {expected:?} payload, got {actual:?}")]
    ContentType {
        provider: Provider,
        expected: ContentType,
        actual: ContentType,
    },
}

impl IngestError {
    pub fn provider(&self) -> Provider {
        match self {
            IngestError::Fetch { provider, .. }
            | IngestError::Timeout { provider, .. }
            | IngestError::Payload { provider, .. }
            | IngestError::ContentType { provider, .. } => *provider,
        }
    }
}

/// Why a single feed entry was dropped. Never fatal to the feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider}: skipping malformed item #{index}: {reason}")]
pub struct MalformedItem {
    pub provider: Provider,
    pub index: usize,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
