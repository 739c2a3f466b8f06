//! Live monitoring and control dashboard for a plant-nursery rig.
//!
//! Sensor readings, actuator flags and notifications live in a hosted
//! realtime database; accounts live in the hosted identity service. This
//! crate mirrors that state, derives the views a browser renders, and
//! forwards the user's writes.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod firebase;
pub mod history;
pub mod models;
pub mod password;
pub mod sessions;
pub mod store;
