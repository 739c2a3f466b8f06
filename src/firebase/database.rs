//! REST client for the hosted realtime database.
//!
//! Reads and writes go to `<base>/<path>.json`. Live subscriptions use the
//! same URL with `Accept: text/event-stream`; the server answers with an
//! initial `put` of the whole location followed by incremental `put`/`patch`
//! events, which are folded into a local mirror so every subscriber item is
//! the full value of the watched path.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::sse::{SseParser, StreamEvent};
use crate::store::tree;
use crate::store::{RealtimeStore, StoreError, Subscription};

/// Wait between reconnect attempts after a dropped stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Realtime database client.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    base_url: String,
    auth: Option<String>,
    client: Client,
    reconnect_delay: Duration,
}

impl DatabaseClient {
    /// `base_url` is the database root, e.g.
    /// `https://my-project-default-rtdb.firebaseio.com`. `auth` is an ID token
    /// or database secret sent as the `auth` query parameter.
    pub fn new(base_url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            client: Client::new(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, tree::segments(path).join("/"))
    }

    /// Build a request with the optional auth parameter.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, self.url(path));
        if let Some(ref auth) = self.auth {
            req = req.query(&[("auth", auth)]);
        }
        req
    }

    /// Convert non-success statuses to `StoreError`.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
            StatusCode::FORBIDDEN => Err(StoreError::PermissionDenied(error_message(&body))),
            _ => Err(StoreError::Server(format!("{}: {}", status, error_message(&body)))),
        }
    }

    async fn write(&self, method: Method, path: &str, body: &Value) -> Result<(), StoreError> {
        let response = self
            .request(method, path)
            .query(&[("print", "silent")])
            .json(body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn open_stream(&self, path: &str) -> Result<reqwest::Response, StoreError> {
        let response = self
            .request(Method::GET, path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        Self::check(response).await
    }

    /// Drive one subscription until it is dropped or the server ends it.
    async fn pump(
        self,
        path: String,
        mut response: reqwest::Response,
        tx: mpsc::UnboundedSender<Value>,
    ) {
        let mut mirror = Value::Null;
        loop {
            match read_stream(response, &mut mirror, &tx).await {
                Ok(()) if tx.is_closed() => return,
                Ok(()) => tracing::debug!("Stream for {} closed by server, reconnecting", path),
                Err(e @ StoreError::StreamEnded(_)) => {
                    tracing::error!("Subscription to {} ended: {}", path, e);
                    return;
                }
                Err(e) => tracing::warn!("Stream for {} failed: {}", path, e),
            }

            response = loop {
                tokio::time::sleep(self.reconnect_delay).await;
                if tx.is_closed() {
                    return;
                }
                match self.open_stream(&path).await {
                    Ok(r) => break r,
                    Err(e) => tracing::warn!("Reconnect to {} failed: {}", path, e),
                }
            };
        }
    }
}

/// Fold stream events into `mirror`, sending the full value after each change.
///
/// Returns `Ok(())` when the body ends or the subscriber went away.
async fn read_stream(
    response: reqwest::Response,
    mirror: &mut Value,
    tx: &mpsc::UnboundedSender<Value>,
) -> Result<(), StoreError> {
    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in parser.feed(&chunk) {
            let event = match StreamEvent::from_frame(&frame) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Skipping malformed {} event: {}", frame.event, e);
                    continue;
                }
            };
            match event {
                StreamEvent::Put { path, data } => {
                    tree::set_at(mirror, &tree::segments(&path), data);
                }
                StreamEvent::Patch { path, data } => {
                    tree::merge_at(mirror, &tree::segments(&path), data);
                }
                StreamEvent::KeepAlive => continue,
                StreamEvent::Cancel(reason) => return Err(StoreError::StreamEnded(reason)),
                StreamEvent::AuthRevoked => {
                    return Err(StoreError::StreamEnded("credential revoked".to_string()))
                }
            }
            if tx.send(mirror.clone()).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Pull `error` out of a `{"error": "..."}` body, else return it whole.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl RealtimeStore for DatabaseClient {
    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        let response = self.request(Method::GET, path).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write(Method::PUT, path, &value).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.write(Method::PATCH, path, &Value::Object(fields)).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, path).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        // first connection is opened here so bad credentials fail the caller
        let response = self.open_stream(path).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.clone().pump(path.to_string(), response, tx));
        Ok(Subscription::new(path, rx, Some(task.abort_handle())))
    }
}
