//! Snapping a dragged event onto the time grid.

use crate::model::Event;
use crate::time::{ClockTime, DateKey};

pub const SNAP_MINUTES: f32 = 15.0;

/// Where an event was dropped: a day, an hour row, and the vertical offset
/// of the pointer inside that row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropTarget {
    pub date: DateKey,
    pub hour: u8,
    pub offset_y: f32,
    pub bucket_height: f32,
}

impl DropTarget {
    /// Target whose offset lands exactly on `time`.
    pub fn at(date: DateKey, time: ClockTime, bucket_height: f32) -> Self {
        DropTarget {
            date,
            hour: time.hour(),
            offset_y: time.minute() as f32 / 60.0 * bucket_height,
            bucket_height,
        }
    }

    pub fn snapped_start(&self) -> ClockTime {
        let minutes = self.hour as i32 * 60 + snap_minute(self.offset_y, self.bucket_height) as i32;
        ClockTime::from_minutes(minutes)
    }
}

/// Offset within the hour rounded to the nearest quarter: 0, 15, 30, 45 or 60.
pub fn snap_minute(offset_y: f32, bucket_height: f32) -> u16 {
    if !(bucket_height > 0.0) {
        return 0;
    }
    let y = offset_y.clamp(0.0, bucket_height);
    let raw = y / bucket_height * 60.0;
    ((raw / SNAP_MINUTES).round() * SNAP_MINUTES) as u16
}

/// New start and end for `event` dropped on `target`. The duration is
/// kept; an end past midnight wraps onto the same day.
pub fn resolve_drop(event: &Event, target: &DropTarget) -> (ClockTime, ClockTime) {
    let duration = event.duration_minutes() as i32;
    let start = target.snapped_start();
    (start, start.add_minutes(duration))
}

/// Marker line shown while an event hovers over a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropPreview {
    pub date: DateKey,
    pub hour: u8,
    pub minute: u16,
}

impl DropPreview {
    pub fn of(target: &DropTarget) -> Self {
        DropPreview {
            date: target.date,
            hour: target.hour,
            minute: snap_minute(target.offset_y, target.bucket_height),
        }
    }

    /// Fraction of the row height where the marker sits.
    pub fn row_fraction(&self) -> f32 {
        self.minute as f32 / 60.0
    }
}
