//! Expansion of repeating adds into concrete dates.

use crate::model::RepeatPolicy;
use crate::time::DateKey;
use chrono::{Duration, Months, NaiveDate};
use std::collections::BTreeSet;

/// Occurrences are generated up to this many months past today.
pub const HORIZON_MONTHS: u32 = 3;

pub fn horizon_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_months(Months::new(HORIZON_MONTHS))
        .unwrap_or(NaiveDate::MAX)
}

/// Dates that receive a copy of a record seeded on `seed`.
///
/// The seed is always first and always present, even past the horizon.
/// Later dates step by one day or one week and never exceed
/// `today + HORIZON_MONTHS`. No date appears twice.
pub fn occurrence_dates(seed: DateKey, policy: RepeatPolicy, today: NaiveDate) -> Vec<DateKey> {
    let mut visited = BTreeSet::new();
    let mut dates = Vec::new();
    visited.insert(seed);
    dates.push(seed);

    let step = match policy {
        RepeatPolicy::None => return dates,
        RepeatPolicy::Daily => Duration::days(1),
        RepeatPolicy::Weekly => Duration::days(7),
    };
    let limit = horizon_end(today);
    let mut cursor = seed;
    loop {
        cursor = match cursor.checked_add_signed(step) {
            Some(next) if next <= limit => next,
            _ => break,
        };
        if visited.insert(cursor) {
            dates.push(cursor);
        }
    }
    dates
}
