//! Service configuration.
//!
//! Values come from `<config dir>/nursery-dashboard/config.json` when it
//! exists, then environment variables override them:
//!
//! - `FIREBASE_API_KEY` - web API key of the hosted project
//! - `FIREBASE_DATABASE_URL` - realtime database root URL
//! - `FIREBASE_DATABASE_SECRET` - credential for server-side database access
//! - `FIREBASE_IDENTITY_URL` / `FIREBASE_TOKEN_URL` - identity endpoints (emulator)
//! - `NURSERY_CORS_ORIGINS` - allowed browser origins, comma-separated
//! - `NURSERY_RATE_LIMIT` - auth requests per minute per client IP
//! - `NURSERY_TRUST_PROXY` - key the rate limit on `X-Forwarded-For` (`true`/`1`)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::firebase::{DEFAULT_IDENTITY_URL, DEFAULT_TOKEN_URL};

const APP_NAME: &str = "nursery-dashboard";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub firebase_api_key: Option<String>,
    pub database_url: Option<String>,
    pub database_secret: Option<String>,
    pub identity_url: String,
    pub token_url: String,
    pub cors_origins: Option<Vec<String>>,
    /// Sign-in/sign-up/reset requests allowed per minute per IP.
    pub rate_limit: u32,
    /// Set when a reverse proxy in front of the server rewrites
    /// `X-Forwarded-For`.
    pub trust_proxy_headers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            firebase_api_key: None,
            database_url: None,
            database_secret: None,
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            cors_origins: None,
            rate_limit: 20,
            trust_proxy_headers: false,
        }
    }
}

impl AppConfig {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from variables resolved by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FIREBASE_API_KEY") {
            self.firebase_api_key = Some(v);
        }
        if let Some(v) = lookup("FIREBASE_DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Some(v) = lookup("FIREBASE_DATABASE_SECRET") {
            self.database_secret = Some(v);
        }
        if let Some(v) = lookup("FIREBASE_IDENTITY_URL") {
            self.identity_url = v;
        }
        if let Some(v) = lookup("FIREBASE_TOKEN_URL") {
            self.token_url = v;
        }
        if let Some(v) = lookup("NURSERY_CORS_ORIGINS") {
            self.cors_origins = Some(v.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Some(v) = lookup("NURSERY_RATE_LIMIT") {
            match v.parse() {
                Ok(limit) => self.rate_limit = limit,
                Err(_) => tracing::warn!("Ignoring invalid NURSERY_RATE_LIMIT={}", v),
            }
        }
        if let Some(v) = lookup("NURSERY_TRUST_PROXY") {
            self.trust_proxy_headers = matches!(v.trim(), "1" | "true");
        }
    }

    /// API key and database URL, which the server cannot run without.
    pub fn firebase(&self) -> Result<(&str, &str)> {
        let api_key = self
            .firebase_api_key
            .as_deref()
            .context("FIREBASE_API_KEY is not set")?;
        let database_url = self
            .database_url
            .as_deref()
            .context("FIREBASE_DATABASE_URL is not set")?;
        Ok((api_key, database_url))
    }
}

fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}
