mod handlers;
pub mod middleware;

pub use handlers::{EmailResponse, HistoryResponse, MessageResponse};

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::dashboard::Dashboard;
use crate::firebase::IdentityProvider;
use crate::sessions::SessionStore;
use middleware::{auth_middleware, rate_limit_middleware, SecurityConfig};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(dashboard: Dashboard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            dashboard,
            identity,
            sessions: SessionStore::new(),
        }
    }
}

pub fn create_router(state: AppState, security: SecurityConfig) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/password/strength", post(handlers::password_strength));

    let mut accounts = Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route(
            "/auth/reset-password",
            get(handlers::verify_reset_code).post(handlers::reset_password),
        );
    if let Some(limiter) = security.rate_limiter.clone() {
        accounts = accounts.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        // Dashboard
        .route("/dashboard", get(handlers::dashboard))
        .route("/sensors", get(handlers::sensors))
        .route("/controls", get(handlers::controls))
        .route("/controls/{control}/toggle", post(handlers::toggle_control))
        // Notifications
        .route(
            "/notifications",
            get(handlers::list_notifications).delete(handlers::clear_notifications),
        )
        .route("/notifications/{id}", delete(handlers::delete_notification))
        // History
        .route("/history", get(handlers::history))
        // Live updates
        .route("/events", get(handlers::events))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/v1", public.merge(accounts).merge(protected))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(origin) => Some(origin),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    }
}
