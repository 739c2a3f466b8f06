use serde::{Deserialize, Serialize};

/// Actuator flags stored under the `controls` node.
///
/// The pump and roof flags are only user-writable while manual mode is on;
/// otherwise the rig's own automation owns them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    #[serde(default)]
    pub is_manual_mode_on: bool,
    #[serde(default)]
    pub is_water_pump_on: bool,
    #[serde(default)]
    pub is_roof_open: bool,
}

/// One of the three user-facing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Control {
    ManualMode,
    WaterPump,
    Roof,
}

impl Control {
    pub const ALL: [Control; 3] = [Control::ManualMode, Control::WaterPump, Control::Roof];

    /// Slug used in API paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualMode => "manual-mode",
            Self::WaterPump => "water-pump",
            Self::Roof => "roof",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual-mode" => Some(Self::ManualMode),
            "water-pump" => Some(Self::WaterPump),
            "roof" => Some(Self::Roof),
            _ => None,
        }
    }

    /// Key of this flag inside the `controls` node.
    pub fn field(&self) -> &'static str {
        match self {
            Self::ManualMode => "isManualModeOn",
            Self::WaterPump => "isWaterPumpOn",
            Self::Roof => "isRoofOpen",
        }
    }
}

/// The fields a single toggle writes, in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChange {
    pub fields: Vec<(&'static str, bool)>,
}

impl ControlChange {
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::Bool(*v)))
            .collect()
    }
}

/// Why a toggle was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ToggleRejected {
    #[error("{0} can only be changed while manual mode is on")]
    ManualModeOff(&'static str),
}

impl ControlState {
    pub fn get(&self, control: Control) -> bool {
        match control {
            Control::ManualMode => self.is_manual_mode_on,
            Control::WaterPump => self.is_water_pump_on,
            Control::Roof => self.is_roof_open,
        }
    }

    /// Compute the write produced by flipping `control`.
    ///
    /// Leaving manual mode also switches the pump off and closes the roof in
    /// the same write.
    pub fn toggled(&self, control: Control) -> Result<ControlChange, ToggleRejected> {
        let next = !self.get(control);
        match control {
            Control::ManualMode if !next => Ok(ControlChange {
                fields: vec![
                    (Control::ManualMode.field(), false),
                    (Control::WaterPump.field(), false),
                    (Control::Roof.field(), false),
                ],
            }),
            Control::ManualMode => Ok(ControlChange {
                fields: vec![(Control::ManualMode.field(), true)],
            }),
            Control::WaterPump | Control::Roof if !self.is_manual_mode_on => {
                Err(ToggleRejected::ManualModeOff(match control {
                    Control::WaterPump => "Water pump",
                    _ => "Roof",
                }))
            }
            _ => Ok(ControlChange {
                fields: vec![(control.field(), next)],
            }),
        }
    }

    /// Apply a change locally, mirroring what the store will hold after it.
    pub fn apply(&mut self, change: &ControlChange) {
        for (field, value) in &change.fields {
            match *field {
                "isManualModeOn" => self.is_manual_mode_on = *value,
                "isWaterPumpOn" => self.is_water_pump_on = *value,
                "isRoofOpen" => self.is_roof_open = *value,
                _ => {}
            }
        }
    }
}
