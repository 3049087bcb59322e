//! Read-only import of timed events from a Google Calendar account.

use crate::config::ImportConfig;
use crate::model::Event;
use crate::time::{ClockTime, DateKey};
use chrono::{Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use log::debug;
use reqwest::Client;
use serde::Deserialize;

pub const UNTITLED: &str = "(No Title)";

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("calendar list failed: HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("request timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Deserialize)]
pub struct EventsListResponse {
    #[serde(default)]
    pub items: Vec<RemoteEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub start: Option<RemoteTime>,
    pub end: Option<RemoteTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub date: Option<String>,
}

/// Fetches upcoming events with a bearer token acquired elsewhere.
pub struct CalendarImporter {
    client: Client,
    config: ImportConfig,
}

impl CalendarImporter {
    pub fn new(config: ImportConfig) -> Result<Self, ImportError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(CalendarImporter { client, config })
    }

    /// Upcoming items from `time_min` onwards, ordered by start time.
    pub async fn fetch(
        &self,
        token: &str,
        time_min: &str,
    ) -> Result<Vec<RemoteEvent>, ImportError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.config.api_base.trim_end_matches('/'),
            self.config.calendar_id
        );
        let max_results = self.config.max_results.to_string();
        debug!("fetching up to {} events from {}", max_results, url);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min),
                ("showDeleted", "false"),
                ("singleEvents", "true"),
                ("maxResults", max_results.as_str()),
                ("orderBy", "startTime"),
            ])
            .send();
        let resp = tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| ImportError::Timeout(self.config.timeout_secs))??;
        if !resp.status().is_success() {
            return Err(ImportError::Status(resp.status()));
        }
        let body: EventsListResponse = resp.json().await?;
        Ok(body.items)
    }

    /// Fetches and normalizes in one step.
    pub async fn import(
        &self,
        token: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<(DateKey, Event)>, ImportError> {
        let time_min = Local
            .from_local_datetime(&now)
            .earliest()
            .unwrap_or_else(Local::now)
            .to_rfc3339_opts(SecondsFormat::Secs, false);
        let items = self.fetch(token, &time_min).await?;
        Ok(normalize(&items))
    }
}

/// One-shot import batch for the account behind `token`.
pub async fn import_upcoming(
    config: ImportConfig,
    token: &str,
    now: NaiveDateTime,
) -> Result<Vec<(DateKey, Event)>, ImportError> {
    CalendarImporter::new(config)?.import(token, now).await
}

/// Timed, non-cancelled items as events placed on their start date. All-day
/// items carry only a `date` and are left out.
pub fn normalize(items: &[RemoteEvent]) -> Vec<(DateKey, Event)> {
    items.iter().filter_map(normalize_one).collect()
}

fn normalize_one(item: &RemoteEvent) -> Option<(DateKey, Event)> {
    if item.status.as_deref() == Some("cancelled") {
        return None;
    }
    let start = item.start.as_ref()?;
    if let (None, Some(day)) = (&start.date_time, &start.date) {
        debug!("skipping all-day item {} on {}", item.id, day);
        return None;
    }
    let start = start.date_time.as_deref()?;
    let end = item.end.as_ref()?.date_time.as_deref()?;
    let (date, start_time) = split_date_time(start)?;
    let (_, end_time) = split_date_time(end)?;
    let title = item
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();
    Some((date, Event::new(item.id.clone(), title, start_time, end_time, None)))
}

/// `2026-10-19T09:30:00-04:00` → (2026-10-19, 09:30), reading the wall-clock
/// fields as written.
fn split_date_time(value: &str) -> Option<(DateKey, ClockTime)> {
    let (date, time) = value.split_once('T')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time: ClockTime = time.get(..5)?.to_string().try_into().ok()?;
    Some((date, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn parse(raw: &str) -> Vec<RemoteEvent> {
        serde_json::from_str::<EventsListResponse>(raw).unwrap().items
    }

    #[test]
    fn timed_items_become_events() {
        let items = parse(
            r#"{"items": [
                {"id": "g1", "summary": "Team meeting",
                 "start": {"dateTime": "2026-10-20T09:05:00-04:00"},
                 "end": {"dateTime": "2026-10-20T09:50:00-04:00"}},
                {"id": "g2", "summary": "Holiday",
                 "start": {"date": "2026-10-21"}, "end": {"date": "2026-10-22"}},
                {"id": "g3", "status": "cancelled", "summary": "Gym",
                 "start": {"dateTime": "2026-10-22T07:00:00Z"},
                 "end": {"dateTime": "2026-10-22T08:00:00Z"}},
                {"id": "g4",
                 "start": {"dateTime": "2026-10-23T18:00:00Z"},
                 "end": {"dateTime": "2026-10-23T19:00:00Z"}}
            ]}"#,
        );
        let events = normalize(&items);
        assert_eq!(events.len(), 2);

        let (date, meeting) = &events[0];
        assert_eq!(date.to_string(), "2026-10-20");
        assert_eq!(meeting.id, "g1");
        assert_eq!(meeting.start_time.to_string(), "09:05");
        assert_eq!(meeting.end_time.to_string(), "09:50");
        assert_eq!(meeting.category, Category::Work);
        assert!(!meeting.completed);
        assert!(meeting.series_id.is_none());

        let (_, untitled) = &events[1];
        assert_eq!(untitled.title, UNTITLED);
        assert_eq!(untitled.category, Category::Personal);
    }

    #[test]
    fn empty_response_has_no_items() {
        assert!(parse("{}").is_empty());
    }

    #[test]
    fn malformed_times_are_skipped() {
        let items = parse(
            r#"{"items": [{"id": "bad", "summary": "x",
                "start": {"dateTime": "tomorrow"}, "end": {"dateTime": "later"}}]}"#,
        );
        assert!(normalize(&items).is_empty());
    }
}
