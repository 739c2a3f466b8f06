use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::tree::{self, get_at};
use super::{RealtimeStore, StoreError, Subscription};

/// In-process store with the same push semantics as the hosted database.
///
/// Stands in for the hosted database in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    root: Value,
    watchers: Vec<Watcher>,
}

struct Watcher {
    path: Vec<String>,
    last: Value,
    tx: mpsc::UnboundedSender<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    pub fn with_data(root: Value) -> Self {
        let store = Self::new();
        store.inner.lock().expect("store lock poisoned").root = root;
        store
    }

    /// Number of live subscriptions.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.watchers.retain(|w| !w.tx.is_closed());
        inner.watchers.len()
    }

    fn write(&self, path: &str, apply: impl FnOnce(&mut Value, &[String])) {
        let written = tree::segments(path);
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Inner { root, watchers } = &mut *inner;

        apply(root, &written);

        watchers.retain_mut(|w| {
            if !tree::overlaps(&w.path, &written) {
                return !w.tx.is_closed();
            }
            let now = get_at(root, &w.path);
            if *now == w.last {
                return !w.tx.is_closed();
            }
            w.last = now.clone();
            w.tx.send(now.clone()).is_ok()
        });
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(get_at(&inner.root, &tree::segments(path)).clone())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write(path, |root, at| tree::set_at(root, at, value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.write(path, |root, at| tree::merge_at(root, at, fields));
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let segments = tree::segments(path);
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let current = get_at(&inner.root, &segments).clone();
        // receiver is alive, send cannot fail here
        let _ = tx.send(current.clone());
        inner.watchers.push(Watcher {
            path: segments,
            last: current,
            tx,
        });

        Ok(Subscription::new(path, rx, None))
    }
}
