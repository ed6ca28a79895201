use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted counter document (canonical JSON). All mutations go through
/// a compare-and-swap on the whole document, so callers observe
/// linearisable behaviour per counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consecutive {
    pub id: String,
    pub name: String,
    /// Format template, e.g. `ORD-{VALUE:6}` or `{PREFIX}{YEAR}-{VALUE:5}`.
    pub format: String,
    pub current_value: i64,
    pub start_value: i64,
    pub increment: i64,
    #[serde(default)]
    pub segments: SegmentConfig,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub values: HashMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub reservation_id: String,
    pub values: Vec<ReservedValue>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub reserved_by: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedValue {
    pub numeric: i64,
    pub formatted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Committed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub action: CounterAction,
    pub value: i64,
    #[serde(default)]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterAction {
    Incremented,
    Committed,
    Cancelled,
    Reset,
}

impl Consecutive {
    pub fn new(name: &str, format: &str, start_value: i64, increment: i64) -> Self {
        Consecutive {
            id: name.to_string(),
            name: name.to_string(),
            format: format.to_string(),
            current_value: start_value,
            start_value,
            increment: increment.max(1),
            segments: SegmentConfig::default(),
            reservations: Vec::new(),
            history: Vec::new(),
            active: true,
        }
    }

    /// Current value for a segment, falling back to the global counter
    /// when segmentation is disabled or the segment is unseen.
    pub fn value_for(&self, segment: Option<&str>) -> i64 {
        match segment {
            Some(seg) if self.segments.enabled => {
                self.segments.values.get(seg).copied().unwrap_or(self.start_value)
            }
            _ => self.current_value,
        }
    }

    pub fn set_value_for(&mut self, segment: Option<&str>, value: i64) {
        match segment {
            Some(seg) if self.segments.enabled => {
                self.segments.values.insert(seg.to_string(), value);
            }
            _ => self.current_value = value,
        }
    }

    pub fn reservation(&self, reservation_id: &str) -> Option<&Reservation> {
        self.reservations
            .iter()
            .find(|r| r.reservation_id == reservation_id)
    }

    pub fn reservation_mut(&mut self, reservation_id: &str) -> Option<&mut Reservation> {
        self.reservations
            .iter_mut()
            .find(|r| r.reservation_id == reservation_id)
    }

    pub fn record(&mut self, action: CounterAction, value: i64, segment: Option<&str>) {
        self.history.push(HistoryEntry {
            date: Utc::now(),
            action,
            value,
            segment: segment.map(|s| s.to_string()),
        });
    }
}

/// Windowed, per-counter metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterMetrics {
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub increments: u64,
    pub resets: u64,
    pub committed_reservations: u64,
    pub cancelled_reservations: u64,
    pub active_reservations: u64,
    pub expired_reservations: u64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    #[serde(default)]
    pub per_segment: HashMap<String, u64>,
}
