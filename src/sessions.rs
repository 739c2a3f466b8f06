//! Dashboard sessions backed by identity-service tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::firebase::{AuthError, AuthTokens, IdentityProvider};

/// Refresh this long before the ID token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A signed-in browser. The session id is the bearer token the browser sends;
/// identity tokens never leave the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub email: String,
    pub user_id: String,
    refresh_token: String,
    /// When the current ID token stops being accepted.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Last authenticated request made with this session.
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    fn apply_tokens(&mut self, tokens: AuthTokens, now: DateTime<Utc>) {
        self.expires_at = now + expiry(&tokens);
        self.refresh_token = tokens.refresh_token;
        if let Some(email) = tokens.email {
            self.email = email;
        }
    }
}

fn expiry(tokens: &AuthTokens) -> Duration {
    Duration::from_std(tokens.expires_in).unwrap_or_else(|_| Duration::hours(1))
}

/// What the browser gets back after signing in.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_token: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_token: session.id,
            email: session.email.clone(),
            expires_at: session.expires_at,
        }
    }
}

/// In-memory session registry.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, tokens: AuthTokens, fallback_email: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            email: tokens
                .email
                .clone()
                .unwrap_or_else(|| fallback_email.to_string()),
            user_id: tokens.user_id.clone(),
            expires_at: now + expiry(&tokens),
            refresh_token: tokens.refresh_token,
            created_at: now,
            last_seen: now,
        };
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .insert(session.id, session.clone());
        tracing::info!("Session started for {}", session.email);
        session
    }

    pub fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// Drop sessions unused for longer than `idle`. Returns how many went.
    pub fn prune(&self, idle: Duration) -> usize {
        self.prune_at(Utc::now(), idle)
    }

    pub fn prune_at(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_seen <= idle);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!("Pruned {} idle sessions", pruned);
        }
        pruned
    }

    fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let session = sessions.get_mut(&id)?;
        session.last_seen = now;
        Some(session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a session, refreshing its ID token first if it is about to
    /// expire. A session whose refresh is refused is removed.
    pub async fn refresh_if_expired(
        &self,
        id: Uuid,
        identity: &dyn IdentityProvider,
    ) -> Result<Option<Session>, AuthError> {
        let now = Utc::now();
        let Some(session) = self.touch(id, now) else {
            return Ok(None);
        };
        if !session.is_expired(now) {
            return Ok(Some(session));
        }

        tracing::debug!("Refreshing ID token for {}", session.email);
        let tokens = match identity.refresh(&session.refresh_token).await {
            Ok(tokens) => tokens,
            Err(e @ AuthError::SessionExpired) => {
                self.remove(id);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match sessions.get_mut(&id) {
            Some(stored) => {
                stored.apply_tokens(tokens, now);
                Ok(Some(stored.clone()))
            }
            // signed out while the refresh was in flight
            None => Ok(None),
        }
    }
}
