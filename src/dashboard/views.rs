//! View models derived from the mirrored state.

use serde::Serialize;

use crate::models::*;

/// One tile in the stat strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub accent: &'static str,
}

/// Sensor feed as the cards see it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(tag = "status", content = "reading", rename_all = "lowercase")]
pub enum SensorStatus {
    /// No push received yet.
    #[default]
    Loading,
    Live(SensorReading),
    /// The last push could not be decoded.
    Error,
}

pub const LOADING: &str = "Loading...";
pub const ERROR: &str = "Error";

pub fn stat_cards(sensors: &SensorStatus, controls: &ControlState) -> Vec<StatCard> {
    let (temperature, moisture, rain, humidity) = match sensors {
        SensorStatus::Loading => (
            LOADING.to_string(),
            LOADING.to_string(),
            LOADING.to_string(),
            LOADING.to_string(),
        ),
        SensorStatus::Error => (
            ERROR.to_string(),
            ERROR.to_string(),
            ERROR.to_string(),
            ERROR.to_string(),
        ),
        SensorStatus::Live(r) => (
            r.temperature_display(),
            r.moisture_display(),
            r.rain_display(),
            r.humidity_display(),
        ),
    };

    vec![
        StatCard {
            title: "Temperature",
            value: temperature,
            accent: "bg-purple-100",
        },
        StatCard {
            title: "Soil Moisture",
            value: moisture,
            accent: "bg-blue-100",
        },
        StatCard {
            title: "Rain",
            value: rain,
            accent: "bg-green-100",
        },
        StatCard {
            title: "Humidity",
            value: humidity,
            accent: "bg-teal-100",
        },
        StatCard {
            title: "System Mode",
            value: if controls.is_manual_mode_on { "Manual" } else { "Auto" }.to_string(),
            accent: "bg-yellow-100",
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRow {
    pub control: Control,
    pub label: &'static str,
    pub description: String,
    pub checked: bool,
    /// Actuator switches are locked outside manual mode.
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlPanel {
    pub state: ControlState,
    pub rows: Vec<ControlRow>,
}

impl ControlPanel {
    pub fn new(state: ControlState) -> Self {
        let locked = !state.is_manual_mode_on;
        let rows = vec![
            ControlRow {
                control: Control::ManualMode,
                label: "Manual Mode",
                description: "Override automatic controls".to_string(),
                checked: state.is_manual_mode_on,
                disabled: false,
            },
            ControlRow {
                control: Control::WaterPump,
                label: "Water Pump",
                description: format!(
                    "Current status: {}",
                    if state.is_water_pump_on { "ON" } else { "OFF" }
                ),
                checked: state.is_water_pump_on,
                disabled: locked,
            },
            ControlRow {
                control: Control::Roof,
                label: "Roof Control",
                description: format!(
                    "Current status: {}",
                    if state.is_roof_open { "OPEN" } else { "CLOSED" }
                ),
                checked: state.is_roof_open,
                disabled: locked,
            },
        ];
        Self { state, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationCard {
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: Option<String>,
    pub classes: &'static str,
}

impl NotificationCard {
    pub fn new(id: &str, notification: &Notification) -> Self {
        Self {
            id: id.to_string(),
            message: notification.message.clone(),
            severity: notification.severity,
            timestamp: notification.timestamp.as_ref().map(ToString::to_string),
            classes: notification.severity.color_classes(),
        }
    }
}

/// Everything the home page renders.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub sensors: SensorStatus,
    pub cards: Vec<StatCard>,
    pub controls: ControlPanel,
    /// `None` while the first notifications push is pending.
    pub notifications: Option<Vec<NotificationCard>>,
    pub live_history: Vec<LivePoint>,
}
