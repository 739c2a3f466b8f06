use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// A stored snapshot of the four sensor fields under `history/<key>`.
///
/// Keys are push ids, so ordering by key is ordering by insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Milliseconds since the Unix epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub moisture: Option<f64>,
    #[serde(default)]
    pub rain: Option<f64>,
}

/// A history point together with its store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: String,
    #[serde(flatten)]
    pub point: HistoryPoint,
}

/// Chart window selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    Day,
    Week,
    Month,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    /// Oldest timestamp still inside the window ending at `now`.
    ///
    /// A month is a calendar month, clamped to the last day of the shorter
    /// month (March 31 minus one month is February 28/29).
    pub fn start_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Day => now - Duration::days(1),
            Self::Week => now - Duration::days(7),
            Self::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

/// One point on the live chart, built from a sensor push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePoint {
    /// Local wall-clock label, `HH:MM`.
    pub time: String,
    pub temperature: f64,
    pub humidity: f64,
    pub moisture: f64,
    pub rain: f64,
}
