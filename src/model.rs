use crate::classify::categorize;
use crate::time::ClockTime;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type RecordId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Class,
    Exercise,
    Social,
    Personal,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Work,
        Category::Class,
        Category::Exercise,
        Category::Social,
        Category::Personal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Class => "class",
            Category::Exercise => "exercise",
            Category::Social => "social",
            Category::Personal => "personal",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Display color a category is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swatch {
    Blue,
    Orange,
    Green,
    Purple,
    Yellow,
    Pink,
    Red,
}

impl Swatch {
    pub const ALL: [Swatch; 7] = [
        Swatch::Blue,
        Swatch::Orange,
        Swatch::Green,
        Swatch::Purple,
        Swatch::Yellow,
        Swatch::Pink,
        Swatch::Red,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Swatch::Blue => "blue",
            Swatch::Orange => "orange",
            Swatch::Green => "green",
            Swatch::Purple => "purple",
            Swatch::Yellow => "yellow",
            Swatch::Pink => "pink",
            Swatch::Red => "red",
        }
    }
}

impl FromStr for Swatch {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Swatch::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownSwatch(s.to_string()))
    }
}

/// Category colors. Display-only; never stored on records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette(BTreeMap<Category, Swatch>);

impl Default for Palette {
    fn default() -> Self {
        Palette(BTreeMap::from([
            (Category::Work, Swatch::Blue),
            (Category::Class, Swatch::Orange),
            (Category::Exercise, Swatch::Green),
            (Category::Social, Swatch::Purple),
            (Category::Personal, Swatch::Yellow),
        ]))
    }
}

impl Palette {
    pub fn swatch(&self, category: Category) -> Swatch {
        self.0
            .get(&category)
            .copied()
            .unwrap_or_else(|| Palette::default().0[&category])
    }

    pub fn set(&mut self, category: Category, swatch: Swatch) {
        self.0.insert(category, swatch);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatPolicy {
    #[default]
    None,
    Daily,
    Weekly,
}

impl RepeatPolicy {
    pub fn label(self) -> &'static str {
        match self {
            RepeatPolicy::None => "none",
            RepeatPolicy::Daily => "daily",
            RepeatPolicy::Weekly => "weekly",
        }
    }

    pub fn next(self) -> Self {
        match self {
            RepeatPolicy::None => RepeatPolicy::Daily,
            RepeatPolicy::Daily => RepeatPolicy::Weekly,
            RepeatPolicy::Weekly => RepeatPolicy::None,
        }
    }
}

impl FromStr for RepeatPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "no" => Ok(RepeatPolicy::None),
            "daily" => Ok(RepeatPolicy::Daily),
            "weekly" => Ok(RepeatPolicy::Weekly),
            _ => Err(ValidationError::UnknownRepeat(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<RecordId>,
    pub title: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub category: Category,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Event {
    /// The category is taken from the title once, here.
    pub fn new(
        id: RecordId,
        title: String,
        start_time: ClockTime,
        end_time: ClockTime,
        details: Option<String>,
    ) -> Self {
        let category = categorize(&title);
        Event {
            id,
            series_id: None,
            title,
            start_time,
            end_time,
            category,
            completed: false,
            details,
        }
    }

    /// Length in minutes, measured forward from the start so that an end
    /// earlier than the start counts as running past midnight.
    pub fn duration_minutes(&self) -> u16 {
        self.start_time.minutes_until(self.end_time)
    }

    /// Half-open `[start, end)` in minutes past midnight; the end may exceed
    /// one day.
    pub fn interval(&self) -> (u32, u32) {
        let start = self.start_time.minutes() as u32;
        (start, start + self.duration_minutes() as u32)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<RecordId>,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(id: RecordId, text: String) -> Self {
        Task {
            id,
            series_id: None,
            text,
            completed: false,
        }
    }
}

/// Input for a new event, possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub details: Option<String>,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(String, ClockTime, ClockTime), ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        let start = self.start_time.ok_or(ValidationError::MissingStartTime)?;
        let end = self.end_time.ok_or(ValidationError::MissingEndTime)?;
        check_interval(start, end)?;
        Ok((title.to_string(), start, end))
    }
}

/// Field changes for an existing event. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEdit {
    pub title: Option<String>,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub details: Option<String>,
}

impl EventEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.details.is_none()
    }

    /// Whether applying this edit sets or changes the event's details.
    pub fn changes_details(&self, original: &Event) -> bool {
        match &self.details {
            Some(d) => original.details.as_deref() != Some(d.as_str()),
            None => false,
        }
    }

    /// Checks the event this edit would produce from `event`.
    pub fn check(&self, event: &Event) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::MissingTitle);
        }
        check_interval(
            self.start_time.unwrap_or(event.start_time),
            self.end_time.unwrap_or(event.end_time),
        )
    }

    pub fn apply(&self, event: &mut Event) {
        if let Some(t) = &self.title {
            event.title = t.clone();
        }
        if let Some(s) = self.start_time {
            event.start_time = s;
        }
        if let Some(e) = self.end_time {
            event.end_time = e;
        }
        if let Some(d) = &self.details {
            event.details = if d.is_empty() { None } else { Some(d.clone()) };
        }
    }
}

/// An event runs from `start` forward to `end`, wrapping past midnight when
/// `end` is the smaller wall-clock time. Only an empty interval is refused.
pub fn check_interval(start: ClockTime, end: ClockTime) -> Result<(), ValidationError> {
    if start.minutes_until(end) == 0 {
        return Err(ValidationError::EmptyInterval { start, end });
    }
    Ok(())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("task text is required")]
    MissingText,
    #[error("start time is incomplete")]
    MissingStartTime,
    #[error("end time is incomplete")]
    MissingEndTime,
    #[error("end time {end} must differ from start time {start}")]
    EmptyInterval { start: ClockTime, end: ClockTime },
    #[error("unknown repeat policy: {0} (use none, daily or weekly)")]
    UnknownRepeat(String),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("unknown color: {0}")]
    UnknownSwatch(String),
}

pub fn generate_id() -> RecordId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}
