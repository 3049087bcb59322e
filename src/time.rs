use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Calendar days are addressed by their local `YYYY-MM-DD` date.
pub type DateKey = NaiveDate;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("invalid time (use HH:MM or h:mm am/pm): {0}")]
    Time(String),
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    Date(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// Wall-clock time of day, stored as minutes past local midnight.
///
/// Serialized as zero-padded `HH:MM`. Any minute value is accepted so that
/// imported events keep their exact times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(ClockTime(hour as u16 * 60 + minute as u16))
        } else {
            None
        }
    }

    /// Wraps around midnight, so `from_minutes(1500)` is 01:00.
    pub fn from_minutes(minutes: i32) -> Self {
        ClockTime(minutes.rem_euclid(MINUTES_PER_DAY as i32) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    pub fn add_minutes(self, delta: i32) -> Self {
        ClockTime::from_minutes(self.0 as i32 + delta)
    }

    /// Minutes from `self` forward to `end`, modulo one day.
    pub fn minutes_until(self, end: ClockTime) -> u16 {
        (end.0 as i32 - self.0 as i32).rem_euclid(MINUTES_PER_DAY as i32) as u16
    }

    /// `h:mm AM/PM`, with midnight shown as 12.
    pub fn display_12h(self) -> String {
        let hour = self.hour();
        let meridiem = if hour < 12 { "AM" } else { "PM" };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour12, self.minute(), meridiem)
    }

    fn parse_24h(input: &str) -> Option<Self> {
        let (h, m) = input.split_once(':')?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return None;
        }
        ClockTime::new(h.parse().ok()?, m.parse().ok()?)
    }

    fn parse_12h(input: &str, meridiem: Meridiem) -> Option<Self> {
        let (h, m) = match input.split_once(':') {
            Some((h, m)) if m.len() == 2 => (h, m.parse::<u8>().ok()?),
            Some(_) => return None,
            None => (input, 0),
        };
        let hour12: u8 = h.trim().parse().ok()?;
        if !(1..=12).contains(&hour12) {
            return None;
        }
        ClockTime::new(to_24_hour(hour12, meridiem), m)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = TimeParseError;

    /// Accepts `HH:MM` as well as `h:mm am`/`h pm` style input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let parsed = if let Some(rest) = raw.strip_suffix("am") {
            ClockTime::parse_12h(rest.trim(), Meridiem::Am)
        } else if let Some(rest) = raw.strip_suffix("pm") {
            ClockTime::parse_12h(rest.trim(), Meridiem::Pm)
        } else {
            ClockTime::parse_24h(&raw)
        };
        parsed.ok_or_else(|| TimeParseError::Time(s.to_string()))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClockTime::parse_24h(value.trim()).ok_or(TimeParseError::Time(value))
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// 12 AM is hour 0, 12 PM is hour 12.
pub fn to_24_hour(hour12: u8, meridiem: Meridiem) -> u8 {
    match meridiem {
        Meridiem::Am => hour12 % 12,
        Meridiem::Pm => hour12 % 12 + 12,
    }
}

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let offset = (date.weekday().num_days_from_sunday() + 6) % 7;
    date - Duration::days(offset as i64)
}

pub fn week_dates(week_start: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| week_start + Duration::days(i as i64))
}

/// Day header such as `Monday 4/21`.
pub fn header_label(date: NaiveDate) -> String {
    format!("{} {}/{}", date.format("%A"), date.month(), date.day())
}

pub fn parse_date_key(input: &str) -> Result<DateKey, TimeParseError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::Date(input.to_string()))
}

/// Source of the current local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn at_midnight(date: NaiveDate) -> Self {
        FixedClock(date.and_time(chrono::NaiveTime::MIN))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn is_current_hour(clock: &dyn Clock, date: NaiveDate, hour: u8) -> bool {
    let now = clock.now();
    now.date() == date && now.hour() == hour as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-10-18 is a Sunday.
        assert_eq!(start_of_week(date(2026, 10, 18)), date(2026, 10, 12));
        assert_eq!(start_of_week(date(2026, 10, 19)), date(2026, 10, 19));
        assert_eq!(start_of_week(date(2026, 10, 22)), date(2026, 10, 19));
    }

    #[test]
    fn week_dates_cover_seven_days() {
        let days = week_dates(date(2026, 10, 19));
        assert_eq!(days[0], date(2026, 10, 19));
        assert_eq!(days[6], date(2026, 10, 25));
    }

    #[test]
    fn twelve_hour_conversion() {
        assert_eq!(to_24_hour(12, Meridiem::Am), 0);
        assert_eq!(to_24_hour(12, Meridiem::Pm), 12);
        assert_eq!(to_24_hour(1, Meridiem::Pm), 13);
        assert_eq!(to_24_hour(9, Meridiem::Am), 9);
    }

    #[test]
    fn display_in_twelve_hour_form() {
        assert_eq!(ClockTime::new(0, 5).unwrap().display_12h(), "12:05 AM");
        assert_eq!(ClockTime::new(12, 0).unwrap().display_12h(), "12:00 PM");
        assert_eq!(ClockTime::new(17, 45).unwrap().display_12h(), "5:45 PM");
    }

    #[test]
    fn parses_both_clock_styles() {
        assert_eq!("09:30".parse::<ClockTime>().unwrap().minutes(), 570);
        assert_eq!("9:07".parse::<ClockTime>().unwrap().minutes(), 547);
        assert_eq!("2:15 pm".parse::<ClockTime>().unwrap().minutes(), 855);
        assert_eq!("12am".parse::<ClockTime>().unwrap().minutes(), 0);
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("13 pm".parse::<ClockTime>().is_err());
        assert!("noon".parse::<ClockTime>().is_err());
    }

    #[test]
    fn serializes_as_padded_hhmm() {
        let t = ClockTime::new(7, 3).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"07:03\"");
        let back: ClockTime = serde_json::from_str("\"23:59\"").unwrap();
        assert_eq!(back.minutes(), 1439);
        assert!(serde_json::from_str::<ClockTime>("\"7pm\"").is_err());
    }

    #[test]
    fn arithmetic_wraps_at_midnight() {
        let late = ClockTime::new(23, 30).unwrap();
        assert_eq!(late.add_minutes(60), ClockTime::new(0, 30).unwrap());
        assert_eq!(late.minutes_until(ClockTime::new(0, 30).unwrap()), 60);
        assert_eq!(ClockTime::from_minutes(-15), ClockTime::new(23, 45).unwrap());
    }

    #[test]
    fn current_hour_uses_the_clock() {
        let clock = FixedClock(date(2026, 10, 19).and_hms_opt(9, 40, 0).unwrap());
        assert!(is_current_hour(&clock, date(2026, 10, 19), 9));
        assert!(!is_current_hour(&clock, date(2026, 10, 19), 10));
        assert!(!is_current_hour(&clock, date(2026, 10, 20), 9));
        assert_eq!(clock.today(), date(2026, 10, 19));
    }

    #[test]
    fn header_labels() {
        assert_eq!(header_label(date(2025, 4, 21)), "Monday 4/21");
        assert_eq!(parse_date_key("2025-04-21").unwrap(), date(2025, 4, 21));
        assert!(parse_date_key("04/21/2025").is_err());
    }
}
