use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension, Json,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use super::middleware::CurrentUser;
use super::AppState;
use crate::dashboard::{ControlPanel, DashboardError, DashboardSnapshot, NotificationCard};
use crate::firebase::AuthError;
use crate::models::*;
use crate::password::{self, StrengthReport};
use crate::sessions::SessionResponse;
use crate::store::StoreError;

type ApiError = (StatusCode, String);

// ============================================================
// Error Handling
// ============================================================

/// Upstream failures are logged in full; the browser gets a generic message.
fn store_error(e: StoreError) -> ApiError {
    tracing::error!("Realtime database error: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        "Realtime database unavailable".to_string(),
    )
}

fn dashboard_error(e: DashboardError) -> ApiError {
    match e {
        DashboardError::Store(e) => store_error(e),
        DashboardError::Rejected(e) => {
            tracing::warn!("Toggle rejected: {}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
        DashboardError::NotificationNotFound(_) => {
            (StatusCode::NOT_FOUND, "Notification not found".to_string())
        }
        DashboardError::InvalidKey(_) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Account errors carry messages meant for the sign-in form.
fn auth_error(e: AuthError) -> ApiError {
    match e {
        AuthError::Http(_) | AuthError::Upstream(_) => {
            tracing::error!("Identity service error: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                "Authentication service unavailable".to_string(),
            )
        }
        AuthError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
        AuthError::InvalidCredentials | AuthError::SessionExpired => {
            tracing::warn!("Authentication failed: {}", e);
            (StatusCode::UNAUTHORIZED, e.to_string())
        }
        _ => {
            tracing::warn!("Account request rejected: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailResponse {
    pub email: String,
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Accounts
// ============================================================

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    password::validate_new_password(&input.password, &input.confirm_password).map_err(|e| {
        tracing::warn!("Sign-up rejected: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let tokens = state
        .identity
        .sign_up(&input.email, &input.password)
        .await
        .map_err(auth_error)?;
    let session = state.sessions.create(tokens, &input.email);
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<SessionResponse>, ApiError> {
    let tokens = state
        .identity
        .sign_in(&input.email, &input.password)
        .await
        .map_err(auth_error)?;
    let session = state.sessions.create(tokens, &input.email);
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> StatusCode {
    state.sessions.remove(user.session_id);
    tracing::info!("Session ended for {}", user.email);
    StatusCode::NO_CONTENT
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .identity
        .send_password_reset(&input.email)
        .await
        .map_err(auth_error)?;
    Ok(Json(MessageResponse {
        message: "Password reset email sent. Check your inbox.".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetCodeQuery {
    #[serde(rename = "oobCode")]
    pub oob_code: Option<String>,
}

/// Check the code from a reset link and report which account it is for.
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Query(query): Query<ResetCodeQuery>,
) -> Result<Json<EmailResponse>, ApiError> {
    let Some(code) = query.oob_code.filter(|c| !c.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid password reset link. Please request a new one.".to_string(),
        ));
    };
    let email = state
        .identity
        .verify_password_reset_code(&code)
        .await
        .map_err(auth_error)?;
    Ok(Json(EmailResponse { email }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> Result<Json<MessageResponse>, ApiError> {
    password::validate_new_password(&input.new_password, &input.confirm_password)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .identity
        .confirm_password_reset(&input.oob_code, &input.new_password)
        .await
        .map_err(auth_error)?;
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully! You can now log in with your new password."
            .to_string(),
    }))
}

pub async fn password_strength(Json(input): Json<StrengthInput>) -> Json<StrengthReport> {
    Json(StrengthReport::evaluate(
        &input.password,
        input.confirm_password.as_deref(),
    ))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<EmailResponse> {
    Json(EmailResponse { email: user.email })
}

// ============================================================
// Dashboard
// ============================================================

pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard.snapshot().await)
}

pub async fn sensors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.sensors().await)
}

pub async fn controls(State(state): State<AppState>) -> Json<ControlPanel> {
    Json(state.dashboard.controls().await)
}

pub async fn toggle_control(
    State(state): State<AppState>,
    Path(control): Path<String>,
) -> Result<Json<ControlPanel>, ApiError> {
    let control = Control::from_str(&control).ok_or((
        StatusCode::BAD_REQUEST,
        format!("Unknown control: {}", control),
    ))?;
    state
        .dashboard
        .toggle(control)
        .await
        .map(Json)
        .map_err(dashboard_error)
}

// ============================================================
// Notifications
// ============================================================

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    /// True until the first notifications push arrived.
    pub loading: bool,
    pub notifications: Vec<NotificationCard>,
}

pub async fn list_notifications(State(state): State<AppState>) -> Json<NotificationsResponse> {
    let notifications = state.dashboard.notifications().await;
    Json(NotificationsResponse {
        loading: notifications.is_none(),
        notifications: notifications.unwrap_or_default(),
    })
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .dashboard
        .delete_notification(&id)
        .await
        .map_err(dashboard_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_notifications(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .dashboard
        .clear_notifications()
        .await
        .map_err(dashboard_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// History
// ============================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// `day` (default), `week` or `month`.
    pub range: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub range: TimeRange,
    pub entries: Vec<HistoryEntry>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let range = match query.range.as_deref() {
        None => TimeRange::default(),
        Some(r) => TimeRange::from_str(r)
            .ok_or((StatusCode::BAD_REQUEST, format!("Unknown range: {}", r)))?,
    };
    let entries = state
        .dashboard
        .history(range)
        .await
        .map_err(dashboard_error)?;
    Ok(Json(HistoryResponse { range, entries }))
}

// ============================================================
// Live events
// ============================================================

fn sse_event(name: &str, data: &impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to encode {} event: {}", name, e);
            Event::default().event("error").data("encoding failed")
        })
}

/// Stream dashboard changes, starting with a full `snapshot` event.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // subscribe before the snapshot so nothing falls between them
    let rx = state.dashboard.events();
    let snapshot = sse_event("snapshot", &state.dashboard.snapshot().await);

    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    return Some((Ok::<_, Infallible>(sse_event(event.name(), &event)), rx))
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let initial = stream::iter([Ok::<_, Infallible>(snapshot)]);
    Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default())
}
