use serde::{Deserialize, Serialize};

/// An alert raised by the rig under `notifications/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    /// Opaque to us: the rig writes either a display string or epoch millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NotificationTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationTime {
    Millis(i64),
    Text(String),
}

impl std::fmt::Display for NotificationTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Millis(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{}", ms),
            },
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Notification severity. Unknown values from upstream land in `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Info,
    Warning,
    Error,
    #[default]
    Other,
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => Self::Info,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

impl Severity {
    /// Border and background classes for a notification card.
    pub fn color_classes(&self) -> &'static str {
        match self {
            Self::Info => "border-blue-200 bg-blue-50",
            Self::Warning => "border-yellow-200 bg-yellow-50",
            Self::Error => "border-red-200 bg-red-50",
            Self::Other => "border-gray-200 bg-gray-50",
        }
    }
}
