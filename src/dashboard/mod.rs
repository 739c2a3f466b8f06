//! Live mirror of the rig's state.
//!
//! [`Dashboard::start`] subscribes to the sensor, control and notification
//! nodes. Each subscription runs in its own task that folds pushes into the
//! shared state and broadcasts a [`DashboardEvent`] to connected browsers.
//! Dropping the last handle (or calling [`Dashboard::shutdown`]) stops the
//! tasks, which drops their subscriptions and deregisters them upstream.

mod views;

pub use views::*;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::AbortHandle;

use crate::history::{self, LiveHistory};
use crate::models::*;
use crate::store::{self, RealtimeStore, StoreError, Subscription};

pub const SENSOR_PATH: &str = "sensorData";
pub const CONTROLS_PATH: &str = "controls";
pub const NOTIFICATIONS_PATH: &str = "notifications";
pub const HISTORY_PATH: &str = "history";

/// How long `start` waits for each node's first value before serving
/// placeholders.
const INITIAL_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Events buffered per browser before a slow one starts skipping.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rejected(#[from] ToggleRejected),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Invalid notification id: {0:?}")]
    InvalidKey(String),
}

/// A change pushed to browsers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    Sensors {
        sensors: SensorStatus,
        cards: Vec<StatCard>,
        /// Point appended to the live chart, if the push decoded.
        point: Option<LivePoint>,
    },
    Controls {
        controls: ControlPanel,
        cards: Vec<StatCard>,
    },
    Notifications {
        notifications: Vec<NotificationCard>,
    },
}

impl DashboardEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sensors { .. } => "sensors",
            Self::Controls { .. } => "controls",
            Self::Notifications { .. } => "notifications",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Feed {
    Sensors,
    Controls,
    Notifications,
}

impl Feed {
    const ALL: [Feed; 3] = [Feed::Sensors, Feed::Controls, Feed::Notifications];

    fn path(&self) -> &'static str {
        match self {
            Self::Sensors => SENSOR_PATH,
            Self::Controls => CONTROLS_PATH,
            Self::Notifications => NOTIFICATIONS_PATH,
        }
    }
}

#[derive(Default)]
struct State {
    sensors: SensorStatus,
    controls: ControlState,
    notifications: Option<BTreeMap<String, Notification>>,
    live: LiveHistory,
}

impl State {
    fn notification_cards(&self) -> Option<Vec<NotificationCard>> {
        self.notifications.as_ref().map(|all| {
            all.iter()
                .map(|(id, n)| NotificationCard::new(id, n))
                .collect()
        })
    }
}

struct Inner {
    store: Arc<dyn RealtimeStore>,
    state: RwLock<State>,
    events: broadcast::Sender<DashboardEvent>,
    feeds: Mutex<Vec<AbortHandle>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for feed in self.feeds.get_mut().expect("feed lock poisoned").drain(..) {
            feed.abort();
        }
    }
}

/// Shared handle to the mirrored dashboard state.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    /// Subscribe to every watched node and start mirroring.
    ///
    /// Returns once each node delivered its first value (or the initial load
    /// timed out), so the first snapshot is already populated.
    pub async fn start(store: Arc<dyn RealtimeStore>) -> Result<Self, StoreError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let dashboard = Self {
            inner: Arc::new(Inner {
                store: store.clone(),
                state: RwLock::new(State::default()),
                events,
                feeds: Mutex::new(Vec::new()),
            }),
        };

        for feed in Feed::ALL {
            let mut subscription = store.subscribe(feed.path()).await?;
            match tokio::time::timeout(INITIAL_LOAD_TIMEOUT, subscription.next()).await {
                Ok(Some(value)) => dashboard.inner.apply(feed, value).await,
                Ok(None) => tracing::warn!("Feed {} closed before first value", feed.path()),
                Err(_) => tracing::warn!("No initial value for {} yet", feed.path()),
            }

            let task = tokio::spawn(run_feed(
                Arc::downgrade(&dashboard.inner),
                feed,
                subscription,
            ));
            dashboard
                .inner
                .feeds
                .lock()
                .expect("feed lock poisoned")
                .push(task.abort_handle());
        }

        tracing::info!("Dashboard subscribed to {} feeds", Feed::ALL.len());
        Ok(dashboard)
    }

    /// Stop all feeds. Mirrored state stays readable but no longer updates.
    pub fn shutdown(&self) {
        let mut feeds = self.inner.feeds.lock().expect("feed lock poisoned");
        for feed in feeds.drain(..) {
            feed.abort();
        }
        tracing::info!("Dashboard feeds stopped");
    }

    /// Receive every change from now on.
    pub fn events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.inner.state.read().await;
        DashboardSnapshot {
            sensors: state.sensors,
            cards: stat_cards(&state.sensors, &state.controls),
            controls: ControlPanel::new(state.controls),
            notifications: state.notification_cards(),
            live_history: state.live.points(),
        }
    }

    pub async fn sensors(&self) -> SensorStatus {
        self.inner.state.read().await.sensors
    }

    pub async fn controls(&self) -> ControlPanel {
        ControlPanel::new(self.inner.state.read().await.controls)
    }

    pub async fn notifications(&self) -> Option<Vec<NotificationCard>> {
        self.inner.state.read().await.notification_cards()
    }

    /// Flip one switch and write the result upstream in a single update.
    pub async fn toggle(&self, control: Control) -> Result<ControlPanel, DashboardError> {
        let current = self.inner.state.read().await.controls;
        let change = current.toggled(control)?;

        self.inner
            .store
            .update(CONTROLS_PATH, change.to_json())
            .await?;
        tracing::info!("Toggled {} ({:?})", control.as_str(), change.fields);

        let mut state = self.inner.state.write().await;
        state.controls.apply(&change);
        Ok(ControlPanel::new(state.controls))
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), DashboardError> {
        if !is_valid_key(id) {
            return Err(DashboardError::InvalidKey(id.to_string()));
        }
        let known = self
            .inner
            .state
            .read()
            .await
            .notifications
            .as_ref()
            .is_some_and(|all| all.contains_key(id));
        if !known {
            return Err(DashboardError::NotificationNotFound(id.to_string()));
        }

        self.inner
            .store
            .remove(&format!("{}/{}", NOTIFICATIONS_PATH, id))
            .await?;
        Ok(())
    }

    pub async fn clear_notifications(&self) -> Result<(), DashboardError> {
        self.inner.store.remove(NOTIFICATIONS_PATH).await?;
        Ok(())
    }

    /// Stored history inside `range`, ending now.
    pub async fn history(&self, range: TimeRange) -> Result<Vec<HistoryEntry>, DashboardError> {
        self.history_at(range, Utc::now()).await
    }

    /// Stored history inside `range`, ending at `now`. Records that fail to
    /// decode are skipped.
    pub async fn history_at(
        &self,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, DashboardError> {
        let raw = self.inner.store.get(HISTORY_PATH).await?;
        let Value::Object(records) = raw else {
            return Ok(Vec::new());
        };

        let points = records.into_iter().filter_map(|(key, value)| {
            match serde_json::from_value::<HistoryPoint>(value) {
                Ok(point) => Some((key, point)),
                Err(e) => {
                    tracing::warn!("Skipping history record {}: {}", key, e);
                    None
                }
            }
        });
        Ok(history::window(points, range, now))
    }
}

/// Firebase keys cannot be empty or contain `. $ # [ ] /`.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '$', '#', '[', ']', '/'])
}

async fn run_feed(dashboard: Weak<Inner>, feed: Feed, mut subscription: Subscription) {
    while let Some(value) = subscription.next().await {
        let Some(inner) = dashboard.upgrade() else {
            return;
        };
        inner.apply(feed, value).await;
    }
    tracing::warn!("Feed {} ended", subscription.path());
}

impl Inner {
    async fn apply(&self, feed: Feed, value: Value) {
        let event = match feed {
            Feed::Sensors => self.apply_sensors(value).await,
            Feed::Controls => self.apply_controls(value).await,
            Feed::Notifications => Some(self.apply_notifications(value).await),
        };
        if let Some(event) = event {
            // no browsers connected is fine
            let _ = self.events.send(event);
        }
    }

    async fn apply_sensors(&self, value: Value) -> Option<DashboardEvent> {
        let decoded = store::decode::<SensorReading>(SENSOR_PATH, value);
        let mut state = self.state.write().await;

        let point = match decoded {
            Ok(None) => return None,
            Ok(Some(reading)) => {
                state.sensors = SensorStatus::Live(reading);
                Some(state.live.push(&reading, Utc::now()).clone())
            }
            Err(e) => {
                tracing::error!("Error reading sensor data: {}", e);
                state.sensors = SensorStatus::Error;
                None
            }
        };

        Some(DashboardEvent::Sensors {
            sensors: state.sensors,
            cards: stat_cards(&state.sensors, &state.controls),
            point,
        })
    }

    async fn apply_controls(&self, value: Value) -> Option<DashboardEvent> {
        let controls = match store::decode::<ControlState>(CONTROLS_PATH, value) {
            Ok(Some(controls)) => controls,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Ignoring controls update: {}", e);
                return None;
            }
        };

        let mut state = self.state.write().await;
        state.controls = controls;
        Some(DashboardEvent::Controls {
            controls: ControlPanel::new(controls),
            cards: stat_cards(&state.sensors, &state.controls),
        })
    }

    async fn apply_notifications(&self, value: Value) -> DashboardEvent {
        let mut all = BTreeMap::new();
        if let Value::Object(entries) = value {
            for (id, entry) in entries {
                match serde_json::from_value::<Notification>(entry) {
                    Ok(n) => {
                        all.insert(id, n);
                    }
                    Err(e) => tracing::warn!("Skipping notification {}: {}", id, e),
                }
            }
        }

        let mut state = self.state.write().await;
        state.notifications = Some(all);
        DashboardEvent::Notifications {
            notifications: state.notification_cards().unwrap_or_default(),
        }
    }
}
