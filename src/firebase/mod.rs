//! Clients for the hosted backend: identity service and realtime database.

mod auth;
mod database;
pub mod sse;

pub use auth::*;
pub use database::DatabaseClient;
