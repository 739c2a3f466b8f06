use serde::{Deserialize, Serialize};

/// Latest values pushed by the rig to the `sensorData` node.
///
/// The rig writes whatever it managed to sample, so every field is optional.
/// A missing field is rendered as `N/A` rather than treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Air temperature in degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative air humidity, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Soil moisture, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moisture: Option<f64>,
    /// Rain sensor wetness, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<f64>,
}

/// Shown for a field the rig did not report.
pub const NOT_AVAILABLE: &str = "N/A";

impl SensorReading {
    /// Temperature with one decimal and a degree suffix, e.g. `24.5°C`.
    /// Ties round away from zero, so `24.25` shows as `24.3°C`.
    pub fn temperature_display(&self) -> String {
        match self.temperature {
            Some(t) => format!("{:.1}°C", (t * 10.0).round() / 10.0),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn humidity_display(&self) -> String {
        percent_display(self.humidity)
    }

    pub fn moisture_display(&self) -> String {
        percent_display(self.moisture)
    }

    pub fn rain_display(&self) -> String {
        percent_display(self.rain)
    }
}

/// Render a percentage the way the rig reports it: `65%`, `62.5%`.
pub fn percent_display(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}%", v),
        None => NOT_AVAILABLE.to_string(),
    }
}
