//! Chart data derived from stored and live sensor history.

use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc};

use crate::models::{HistoryEntry, HistoryPoint, LivePoint, SensorReading, TimeRange};

/// Points kept on the live chart.
pub const LIVE_HISTORY_LEN: usize = 7;

/// Keep the records inside `range` ending at `now`, ordered by key.
///
/// Records exactly on the boundary are kept.
pub fn window<I>(records: I, range: TimeRange, now: DateTime<Utc>) -> Vec<HistoryEntry>
where
    I: IntoIterator<Item = (String, HistoryPoint)>,
{
    let start = range.start_boundary(now);
    let mut kept: Vec<HistoryEntry> = records
        .into_iter()
        .filter(|(_, point)| point.timestamp >= start)
        .map(|(key, point)| HistoryEntry { key, point })
        .collect();
    kept.sort_by(|a, b| a.key.cmp(&b.key));
    kept
}

/// Rolling buffer behind the live chart.
#[derive(Debug, Clone, Default)]
pub struct LiveHistory {
    points: VecDeque<LivePoint>,
}

impl LiveHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point for `reading`, labelled with the local time of `at`.
    /// Missing fields are charted as zero.
    pub fn push(&mut self, reading: &SensorReading, at: DateTime<Utc>) -> &LivePoint {
        if self.points.len() == LIVE_HISTORY_LEN {
            self.points.pop_front();
        }
        self.points.push_back(LivePoint {
            time: at.with_timezone(&Local).format("%H:%M").to_string(),
            temperature: reading.temperature.unwrap_or(0.0),
            humidity: reading.humidity.unwrap_or(0.0),
            moisture: reading.moisture.unwrap_or(0.0),
            rain: reading.rain.unwrap_or(0.0),
        });
        self.points.back().expect("just pushed")
    }

    pub fn points(&self) -> Vec<LivePoint> {
        self.points.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
