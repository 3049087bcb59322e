//! Placement of events inside a day column.
//!
//! Every event that starts in an hour row is drawn from that row. Its
//! overlap group is every event of the day whose interval intersects its
//! own, in stored order, and the group shares the column width equally.
//! This is not a minimal coloring: three events in a chain where only
//! neighbours overlap still get three columns.

use crate::model::Event;

pub const DEFAULT_PIXELS_PER_QUARTER_HOUR: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub pixels_per_quarter_hour: f32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        LayoutMetrics {
            pixels_per_quarter_hour: DEFAULT_PIXELS_PER_QUARTER_HOUR,
        }
    }
}

impl LayoutMetrics {
    pub fn hour_height(&self) -> f32 {
        self.pixels_per_quarter_hour * 4.0
    }
}

/// Geometry of one event. Horizontal values are percentages of the day
/// column; vertical values are pixels from the top of the hour row.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBox<'a> {
    pub event: &'a Event,
    pub hour: u8,
    pub column: usize,
    pub group_size: usize,
    pub width_pct: f32,
    pub left_pct: f32,
    pub top_px: f32,
    pub height_px: f32,
}

fn overlaps(a: (u32, u32), b: (u32, u32)) -> bool {
    b.0 < a.1 && b.1 > a.0
}

/// Boxes for the events that start inside `hour`.
pub fn layout_hour<'a>(events: &'a [Event], hour: u8, metrics: &LayoutMetrics) -> Vec<EventBox<'a>> {
    let bucket_start = hour as u32 * 60;
    let bucket_end = bucket_start + 60;
    let intervals: Vec<(u32, u32)> = events.iter().map(Event::interval).collect();

    intervals
        .iter()
        .enumerate()
        .filter(|(_, (start, _))| (bucket_start..bucket_end).contains(start))
        .map(|(idx, &this)| {
            let group: Vec<usize> = intervals
                .iter()
                .enumerate()
                .filter(|&(other, &span)| other == idx || overlaps(this, span))
                .map(|(other, _)| other)
                .collect();
            let column = group.iter().position(|&other| other == idx).unwrap_or(0);
            let width_pct = 100.0 / group.len() as f32;
            let quarter = metrics.pixels_per_quarter_hour;
            EventBox {
                event: &events[idx],
                hour,
                column,
                group_size: group.len(),
                width_pct,
                left_pct: column as f32 * width_pct,
                top_px: (this.0 - bucket_start) as f32 / 15.0 * quarter,
                height_px: (this.1 - this.0) as f32 / 15.0 * quarter,
            }
        })
        .collect()
}

/// Boxes for a whole day, hour by hour.
pub fn layout_day<'a>(events: &'a [Event], metrics: &LayoutMetrics) -> Vec<EventBox<'a>> {
    (0..24u8)
        .flat_map(|hour| layout_hour(events, hour, metrics))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, start: &str, end: &str) -> Event {
        Event::new(id.into(), id.into(), start.parse().unwrap(), end.parse().unwrap(), None)
    }

    #[test]
    fn lone_event_takes_the_full_width() {
        let events = vec![event("a", "09:15", "10:00")];
        let boxes = layout_hour(&events, 9, &LayoutMetrics::default());
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.width_pct, 100.0);
        assert_eq!(b.left_pct, 0.0);
        assert_eq!(b.top_px, 12.0);
        assert_eq!(b.height_px, 36.0);
    }

    #[test]
    fn pairwise_overlaps_split_evenly() {
        let events = vec![
            event("a", "10:00", "11:00"),
            event("b", "10:15", "11:30"),
            event("c", "10:30", "10:50"),
            event("d", "10:45", "12:00"),
        ];
        let boxes = layout_hour(&events, 10, &LayoutMetrics::default());
        assert_eq!(boxes.len(), 4);
        let mut offsets: Vec<f32> = boxes.iter().map(|b| b.left_pct).collect();
        for b in &boxes {
            assert_eq!(b.width_pct, 25.0);
            assert_eq!(b.group_size, 4);
        }
        offsets.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(offsets, vec![0.0, 25.0, 50.0, 75.0]);
    }

    #[test]
    fn chains_are_not_recolored() {
        // a overlaps b, b overlaps c, a and c do not touch.
        let events = vec![
            event("a", "08:00", "08:45"),
            event("b", "08:30", "09:30"),
            event("c", "08:50", "10:00"),
        ];
        let boxes = layout_hour(&events, 8, &LayoutMetrics::default());
        let by_id = |id: &str| boxes.iter().find(|b| b.event.id == id).unwrap();
        assert_eq!(by_id("a").group_size, 2);
        assert_eq!(by_id("a").column, 0);
        assert_eq!(by_id("b").group_size, 3);
        assert_eq!(by_id("b").column, 1);
        assert_eq!(by_id("c").group_size, 2);
        assert_eq!(by_id("c").column, 1);
        assert_eq!(by_id("c").left_pct, 50.0);
    }

    #[test]
    fn touching_events_do_not_overlap() {
        let events = vec![event("a", "13:00", "14:00"), event("b", "14:00", "15:00")];
        let metrics = LayoutMetrics::default();
        assert_eq!(layout_hour(&events, 13, &metrics)[0].width_pct, 100.0);
        assert_eq!(layout_hour(&events, 14, &metrics)[0].width_pct, 100.0);
    }

    #[test]
    fn columns_follow_stored_order_not_start_time() {
        let events = vec![event("late", "16:30", "17:30"), event("early", "16:00", "17:00")];
        let boxes = layout_hour(&events, 16, &LayoutMetrics::default());
        let late = boxes.iter().find(|b| b.event.id == "late").unwrap();
        let early = boxes.iter().find(|b| b.event.id == "early").unwrap();
        assert_eq!(late.column, 0);
        assert_eq!(early.column, 1);
    }

    #[test]
    fn wrapped_events_keep_their_own_column_and_height() {
        let events = vec![event("night", "23:00", "01:00"), event("late", "23:30", "23:45")];
        let boxes = layout_hour(&events, 23, &LayoutMetrics::default());
        let night = boxes.iter().find(|b| b.event.id == "night").unwrap();
        assert_eq!(night.column, 0);
        assert_eq!(night.group_size, 2);
        assert_eq!(night.height_px, 96.0);
    }

    #[test]
    fn day_layout_visits_every_event_once() {
        let events = vec![
            event("a", "00:00", "00:30"),
            event("b", "12:05", "13:00"),
            event("c", "23:59", "23:59"),
        ];
        let metrics = LayoutMetrics {
            pixels_per_quarter_hour: 1.0,
        };
        let boxes = layout_day(&events, &metrics);
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[1].hour, 12);
        assert!((boxes[1].top_px - 5.0 / 15.0).abs() < 1e-6);
        assert_eq!(boxes[2].height_px, 0.0);
        assert_eq!(metrics.hour_height(), 4.0);
    }
}
