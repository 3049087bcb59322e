//! Per-day input forms for new events and tasks.

use crate::model::{EventDraft, RepeatPolicy, ValidationError};
use crate::schedule::ScheduleStore;
use crate::time::{ClockTime, DateKey};
use std::collections::BTreeMap;

/// Minutes offered by the time pickers.
pub const MINUTE_OPTIONS: [u8; 4] = [0, 15, 30, 45];

/// Gap applied to the end time whenever the start time is completed.
pub const DEFAULT_EVENT_MINUTES: i32 = 60;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub visible: bool,
    pub title: String,
    pub repeat: RepeatPolicy,
    pub start_hour: Option<u8>,
    pub start_minute: Option<u8>,
    pub end_hour: Option<u8>,
    pub end_minute: Option<u8>,
}

impl EventForm {
    /// Picking a start hour fills in :00 if no minute was chosen yet.
    pub fn set_start_hour(&mut self, hour: u8) {
        self.start_hour = Some(hour.min(23));
        if self.start_minute.is_none() {
            self.start_minute = Some(0);
        }
        self.sync_end();
    }

    pub fn set_start_minute(&mut self, minute: u8) {
        self.start_minute = Some(minute.min(59));
        self.sync_end();
    }

    pub fn set_end_hour(&mut self, hour: u8) {
        self.end_hour = Some(hour.min(23));
    }

    pub fn set_end_minute(&mut self, minute: u8) {
        self.end_minute = Some(minute.min(59));
    }

    pub fn start_time(&self) -> Option<ClockTime> {
        ClockTime::new(self.start_hour?, self.start_minute?)
    }

    pub fn end_time(&self) -> Option<ClockTime> {
        ClockTime::new(self.end_hour?, self.end_minute?)
    }

    /// Steps the start by `delta` quarter hours, starting from 09:00.
    pub fn nudge_start(&mut self, delta: i32) {
        let current = self.start_time().unwrap_or(ClockTime::from_minutes(9 * 60 - 15 * delta));
        let next = current.add_minutes(15 * delta);
        self.start_hour = Some(next.hour());
        self.start_minute = Some(next.minute());
        self.sync_end();
    }

    pub fn nudge_end(&mut self, delta: i32) {
        let current = match self.end_time().or_else(|| self.start_time()) {
            Some(t) => t,
            None => return,
        };
        let next = current.add_minutes(15 * delta);
        self.end_hour = Some(next.hour());
        self.end_minute = Some(next.minute());
    }

    pub fn draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            start_time: self.start_time(),
            end_time: self.end_time(),
            details: None,
        }
    }

    fn sync_end(&mut self) {
        if let Some(start) = self.start_time() {
            let end = start.add_minutes(DEFAULT_EVENT_MINUTES);
            self.end_hour = Some(end.hour());
            self.end_minute = Some(end.minute());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub visible: bool,
    pub text: String,
    pub repeat: RepeatPolicy,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayForms {
    pub event: EventForm,
    pub task: TaskForm,
}

/// Form state for every day that has been touched.
#[derive(Debug, Default)]
pub struct FormBook {
    days: BTreeMap<DateKey, DayForms>,
}

impl FormBook {
    pub fn get(&self, date: DateKey) -> Option<&DayForms> {
        self.days.get(&date)
    }

    pub fn day_mut(&mut self, date: DateKey) -> &mut DayForms {
        self.days.entry(date).or_default()
    }

    pub fn toggle_event_form(&mut self, date: DateKey) -> bool {
        let form = &mut self.day_mut(date).event;
        form.visible = !form.visible;
        form.visible
    }

    pub fn toggle_task_form(&mut self, date: DateKey) -> bool {
        let form = &mut self.day_mut(date).task;
        form.visible = !form.visible;
        form.visible
    }

    /// Adds the day's draft event. On success the form is cleared and
    /// hidden; on failure the input is left for correction.
    pub fn submit_event(
        &mut self,
        date: DateKey,
        store: &mut ScheduleStore,
    ) -> Result<usize, ValidationError> {
        let form = &mut self.day_mut(date).event;
        let ids = store.add_event(date, &form.draft(), form.repeat)?;
        *form = EventForm::default();
        Ok(ids.len())
    }

    pub fn submit_task(
        &mut self,
        date: DateKey,
        store: &mut ScheduleStore,
    ) -> Result<usize, ValidationError> {
        let form = &mut self.day_mut(date).task;
        let ids = store.add_task(date, &form.text, form.repeat)?;
        form.text.clear();
        form.repeat = RepeatPolicy::None;
        Ok(ids.len())
    }
}
