//! The realtime store seam.
//!
//! The dashboard never talks to the hosted database directly; it goes through
//! [`RealtimeStore`]. Production uses [`crate::firebase::DatabaseClient`],
//! tests use [`MemoryStore`].

mod memory;
pub mod tree;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Store access errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: database rejected the credentials")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Stream ended: {0}")]
    StreamEnded(String),

    #[error("Unexpected data at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A hosted key-value tree that pushes changes to subscribers.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Current value at `path`; `Null` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Value, StoreError>;

    /// Replace the value at `path`. Writing `Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Write several children of `path` in a single request.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    /// Watch `path`. The first item is the current value; each later item is
    /// the full value after a change.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}

/// Decode a snapshot taken at `path`.
pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<Option<T>, StoreError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_string(),
            source,
        })
}

/// A live registration on one path. Dropping it deregisters.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Value>,
    feed: Option<AbortHandle>,
}

impl Subscription {
    /// Build a subscription fed by `rx`. If a background task produces the
    /// values, pass its handle so dropping the subscription stops it.
    pub fn new(
        path: impl Into<String>,
        rx: mpsc::UnboundedReceiver<Value>,
        feed: Option<AbortHandle>,
    ) -> Self {
        Self {
            path: path.into(),
            rx,
            feed,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next snapshot, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}
