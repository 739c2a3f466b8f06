//! Client for the hosted identity service (Identity Toolkit REST API).
//!
//! Accounts, passwords and token lifetimes belong to the service; this module
//! only forwards requests and translates its error codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Identity errors, with messages fit to show on a sign-in form.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailExists,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("This password reset link is invalid or has expired. Please request a new one.")]
    InvalidResetCode,

    #[error("This account has been disabled")]
    UserDisabled,

    #[error("Too many attempts. Please try again later.")]
    TooManyAttempts,

    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Authentication service error: {0}")]
    Upstream(String),
}

impl AuthError {
    /// Map an upstream code such as `WEAK_PASSWORD : Password should be ...`.
    pub fn from_code(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match code {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                Self::InvalidCredentials
            }
            "EMAIL_EXISTS" => Self::EmailExists,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => Self::WeakPassword,
            "EXPIRED_OOB_CODE" | "INVALID_OOB_CODE" | "MISSING_OOB_CODE" => Self::InvalidResetCode,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND"
            | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => Self::SessionExpired,
            _ => Self::Upstream(message.to_string()),
        }
    }
}

/// Tokens issued on sign-in, sign-up or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub id_token: String,
    pub refresh_token: String,
    /// Stable account id.
    pub user_id: String,
    /// Absent on refresh.
    pub email: Option<String>,
    pub expires_in: Duration,
}

/// Account operations the dashboard relies on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError>;

    /// Email a reset link. The link carries an `oobCode`.
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Check a reset code; returns the account email it belongs to.
    async fn verify_password_reset_code(&self, code: &str) -> Result<String, AuthError>;

    /// Set a new password using a reset code; returns the account email.
    async fn confirm_password_reset(&self, code: &str, new_password: &str)
        -> Result<String, AuthError>;

    /// Exchange a refresh token for a fresh ID token.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
}

/// Identity Toolkit client.
#[derive(Debug, Clone)]
pub struct AuthClient {
    api_key: String,
    identity_url: String,
    token_url: String,
    client: Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct EmailResponse {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

fn parse_expiry(seconds: &str) -> Duration {
    Duration::from_secs(seconds.parse().unwrap_or(3600))
}

impl AuthClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_urls(api_key, DEFAULT_IDENTITY_URL, DEFAULT_TOKEN_URL)
    }

    /// Point at non-default endpoints, e.g. the local emulator.
    pub fn with_urls(
        api_key: impl Into<String>,
        identity_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            identity_url: identity_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// POST a JSON body to `accounts:<method>`.
    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let response = self
            .client
            .post(format!("{}/accounts:{}", self.identity_url, method))
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => Err(AuthError::from_code(&err.error.message)),
            Err(_) => Err(AuthError::Upstream(format!("{}: {}", status, body))),
        }
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthTokens, AuthError> {
        let response: SignInResponse = self
            .call(
                method,
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(AuthTokens {
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            user_id: response.local_id,
            email: response.email.or_else(|| Some(email.to_string())),
            expires_in: parse_expiry(&response.expires_in),
        })
    }
}

#[async_trait]
impl IdentityProvider for AuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        self.password_call("signUp", email, password).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: EmailResponse = self
            .call(
                "sendOobCode",
                &serde_json::json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn verify_password_reset_code(&self, code: &str) -> Result<String, AuthError> {
        let response: EmailResponse = self
            .call("resetPassword", &serde_json::json!({ "oobCode": code }))
            .await?;
        Ok(response.email)
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<String, AuthError> {
        let response: EmailResponse = self
            .call(
                "resetPassword",
                &serde_json::json!({ "oobCode": code, "newPassword": new_password }),
            )
            .await?;
        Ok(response.email)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let response = self
            .client
            .post(format!("{}/token", self.token_url))
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let response: RefreshResponse = Self::handle_response(response).await?;
        Ok(AuthTokens {
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            user_id: response.user_id,
            email: None,
            expires_in: parse_expiry(&response.expires_in),
        })
    }
}
