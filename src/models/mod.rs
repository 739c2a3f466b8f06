//! Domain models for the nursery dashboard.
//!
//! Every type here mirrors a node of the hosted realtime database and uses
//! the field names the rig writes (camelCase). Nothing is owned locally:
//!
//! - [`SensorReading`]: latest values under `sensorData`.
//! - [`ControlState`]: manual mode and actuator flags under `controls`.
//! - [`Notification`]: alerts under `notifications/<id>`, user-deletable.
//! - [`HistoryPoint`]: timestamped snapshots under `history/<key>`.
//! - [`LivePoint`]: chart points derived from live pushes.
//!
//! Request bodies for the account routes live in `account`.

mod account;
mod controls;
mod history;
mod notification;
mod sensor;

pub use account::*;
pub use controls::*;
pub use history::*;
pub use notification::*;
pub use sensor::*;
