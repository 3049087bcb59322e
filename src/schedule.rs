use crate::drag::{resolve_drop, DropTarget};
use crate::model::{
    generate_id, Category, Event, EventDraft, EventEdit, Palette, RecordId, RepeatPolicy, Swatch,
    Task, ValidationError,
};
use crate::recurrence::occurrence_dates;
use crate::storage::{Persistence, COLORS_KEY, EVENTS_KEY, TASKS_KEY};
use crate::time::{Clock, DateKey};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};

pub type EventMap = BTreeMap<DateKey, Vec<Event>>;
pub type TaskMap = BTreeMap<DateKey, Vec<Task>>;

/// Events and tasks by day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    events: EventMap,
    tasks: TaskMap,
}

impl Schedule {
    pub fn from_parts(events: EventMap, tasks: TaskMap) -> Self {
        Schedule { events, tasks }
    }

    pub fn events(&self) -> &EventMap {
        &self.events
    }

    pub fn tasks(&self) -> &TaskMap {
        &self.tasks
    }

    pub fn events_on(&self, date: DateKey) -> &[Event] {
        self.events.get(&date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tasks_on(&self, date: DateKey) -> &[Task] {
        self.tasks.get(&date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn event(&self, date: DateKey, id: &str) -> Option<&Event> {
        self.events_on(date).iter().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tasks.is_empty()
    }

    /// Adds an event on `date` and, when repeating, on every later
    /// occurrence date up to the horizon. Returns the ids created.
    pub fn add_event(
        &mut self,
        date: DateKey,
        draft: &EventDraft,
        repeat: RepeatPolicy,
        today: NaiveDate,
    ) -> Result<Vec<RecordId>, ValidationError> {
        let (title, start, end) = draft.validate()?;
        let details = draft
            .details
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let base = Event::new(String::new(), title, start, end, details);
        let dates = occurrence_dates(date, repeat, today);
        let series_id = (dates.len() > 1).then(generate_id);

        let placed: Vec<(DateKey, Event)> = dates
            .into_iter()
            .map(|d| {
                let mut occurrence = base.clone();
                occurrence.id = generate_id();
                occurrence.series_id = series_id.clone();
                (d, occurrence)
            })
            .collect();
        let ids = placed.iter().map(|(_, e)| e.id.clone()).collect();
        for (d, occurrence) in placed {
            self.events.entry(d).or_default().push(occurrence);
        }
        Ok(ids)
    }

    pub fn add_task(
        &mut self,
        date: DateKey,
        text: &str,
        repeat: RepeatPolicy,
        today: NaiveDate,
    ) -> Result<Vec<RecordId>, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::MissingText);
        }
        let dates = occurrence_dates(date, repeat, today);
        let series_id = (dates.len() > 1).then(generate_id);
        let placed: Vec<(DateKey, Task)> = dates
            .into_iter()
            .map(|d| {
                let mut task = Task::new(generate_id(), text.to_string());
                task.series_id = series_id.clone();
                (d, task)
            })
            .collect();
        let ids = placed.iter().map(|(_, t)| t.id.clone()).collect();
        for (d, task) in placed {
            self.tasks.entry(d).or_default().push(task);
        }
        Ok(ids)
    }

    pub fn toggle_event_complete(&mut self, date: DateKey, id: &str) -> bool {
        self.event_mut(date, id)
            .map(|e| e.completed = !e.completed)
            .is_some()
    }

    pub fn toggle_task_complete(&mut self, date: DateKey, id: &str) -> bool {
        self.task_mut(date, id)
            .map(|t| t.completed = !t.completed)
            .is_some()
    }

    pub fn delete_event(&mut self, date: DateKey, id: &str) -> bool {
        remove_where(&mut self.events, date, |e| e.id == id).is_some()
    }

    pub fn delete_task(&mut self, date: DateKey, id: &str) -> bool {
        remove_where(&mut self.tasks, date, |t| t.id == id).is_some()
    }

    pub fn update_task_text(&mut self, date: DateKey, id: &str, text: &str) -> bool {
        self.task_mut(date, id)
            .map(|t| t.text = text.to_string())
            .is_some()
    }

    /// Applies `edit` to one event, or with `apply_to_all` to every event in
    /// the same series. Returns how many events changed.
    /// Applies `edit` to one event, or to its whole series when
    /// `apply_to_all` is set. Every affected event is checked first, so a
    /// rejected edit changes nothing. Returns the number of events edited.
    pub fn edit_event(
        &mut self,
        date: DateKey,
        id: &str,
        edit: &EventEdit,
        apply_to_all: bool,
    ) -> Result<usize, ValidationError> {
        let series_id = match self.event(date, id) {
            Some(original) => original.series_id.clone(),
            None => return Ok(0),
        };
        match series_id {
            Some(series) if apply_to_all => {
                let in_series = |e: &Event| e.series_id.as_deref() == Some(series.as_str());
                for event in self.events.values().flatten().filter(|e| in_series(e)) {
                    edit.check(event)?;
                }
                let mut changed = 0;
                for event in self.events.values_mut().flatten().filter(|e| in_series(e)) {
                    edit.apply(event);
                    changed += 1;
                }
                Ok(changed)
            }
            _ => match self.event_mut(date, id) {
                Some(event) => {
                    edit.check(event)?;
                    edit.apply(event);
                    Ok(1)
                }
                None => Ok(0),
            },
        }
    }

    /// Moves an event to the drop target, keeping its duration. A stale id
    /// leaves the schedule untouched.
    pub fn relocate_event(&mut self, source: DateKey, id: &str, target: &DropTarget) -> bool {
        let Some(mut moved) = remove_where(&mut self.events, source, |e| e.id == id) else {
            return false;
        };
        let (start, end) = resolve_drop(&moved, target);
        moved.start_time = start;
        moved.end_time = end;
        self.events.entry(target.date).or_default().push(moved);
        true
    }

    /// Adds imported events, skipping any whose id already exists anywhere
    /// in the schedule. Returns the number added.
    pub fn merge_imported(&mut self, batch: Vec<(DateKey, Event)>) -> usize {
        let mut known: HashSet<RecordId> = self
            .events
            .values()
            .flatten()
            .map(|e| e.id.clone())
            .collect();
        let mut added = 0;
        for (date, event) in batch {
            if known.insert(event.id.clone()) {
                self.events.entry(date).or_default().push(event);
                added += 1;
            }
        }
        added
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.tasks.clear();
    }

    fn event_mut(&mut self, date: DateKey, id: &str) -> Option<&mut Event> {
        self.events.get_mut(&date)?.iter_mut().find(|e| e.id == id)
    }

    fn task_mut(&mut self, date: DateKey, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(&date)?.iter_mut().find(|t| t.id == id)
    }
}

/// Removes the first matching record of a day, dropping the day once empty.
fn remove_where<T>(
    map: &mut BTreeMap<DateKey, Vec<T>>,
    date: DateKey,
    matches: impl Fn(&T) -> bool,
) -> Option<T> {
    let list = map.get_mut(&date)?;
    let idx = list.iter().position(matches)?;
    let removed = list.remove(idx);
    if list.is_empty() {
        map.remove(&date);
    }
    Some(removed)
}

/// The schedule plus its persistence. Every mutation writes through; write
/// failures are logged and the in-memory state stays authoritative.
pub struct ScheduleStore {
    schedule: Schedule,
    palette: Palette,
    persistence: Box<dyn Persistence>,
    clock: Box<dyn Clock>,
}

impl ScheduleStore {
    pub fn open(persistence: Box<dyn Persistence>, clock: Box<dyn Clock>) -> Self {
        let events: EventMap = load_or_default(persistence.as_ref(), EVENTS_KEY);
        let tasks: TaskMap = load_or_default(persistence.as_ref(), TASKS_KEY);
        let palette: Palette = load_or_default(persistence.as_ref(), COLORS_KEY);
        debug!(
            "loaded {} event day(s) and {} task day(s)",
            events.len(),
            tasks.len()
        );
        ScheduleStore {
            schedule: Schedule::from_parts(events, tasks),
            palette,
            persistence,
            clock,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[cfg(test)]
    pub fn persistence(&self) -> &dyn Persistence {
        self.persistence.as_ref()
    }

    pub fn add_event(
        &mut self,
        date: DateKey,
        draft: &EventDraft,
        repeat: RepeatPolicy,
    ) -> Result<Vec<RecordId>, ValidationError> {
        let today = self.clock.today();
        let ids = self.schedule.add_event(date, draft, repeat, today)?;
        info!("added {} occurrence(s) of {:?}", ids.len(), draft.title.trim());
        self.persist();
        Ok(ids)
    }

    pub fn add_task(
        &mut self,
        date: DateKey,
        text: &str,
        repeat: RepeatPolicy,
    ) -> Result<Vec<RecordId>, ValidationError> {
        let today = self.clock.today();
        let ids = self.schedule.add_task(date, text, repeat, today)?;
        self.persist();
        Ok(ids)
    }

    pub fn toggle_event_complete(&mut self, date: DateKey, id: &str) -> bool {
        let found = self.schedule.toggle_event_complete(date, id);
        self.persist_if(found)
    }

    pub fn toggle_task_complete(&mut self, date: DateKey, id: &str) -> bool {
        let found = self.schedule.toggle_task_complete(date, id);
        self.persist_if(found)
    }

    pub fn delete_event(&mut self, date: DateKey, id: &str) -> bool {
        let found = self.schedule.delete_event(date, id);
        self.persist_if(found)
    }

    pub fn delete_task(&mut self, date: DateKey, id: &str) -> bool {
        let found = self.schedule.delete_task(date, id);
        self.persist_if(found)
    }

    pub fn update_task_text(&mut self, date: DateKey, id: &str, text: &str) -> bool {
        let found = self.schedule.update_task_text(date, id, text);
        self.persist_if(found)
    }

    pub fn edit_event(
        &mut self,
        date: DateKey,
        id: &str,
        edit: &EventEdit,
        apply_to_all: bool,
    ) -> Result<usize, ValidationError> {
        let changed = self.schedule.edit_event(date, id, edit, apply_to_all)?;
        self.persist_if(changed > 0);
        Ok(changed)
    }

    pub fn relocate_event(&mut self, source: DateKey, id: &str, target: &DropTarget) -> bool {
        let moved = self.schedule.relocate_event(source, id, target);
        if !moved {
            debug!("drop ignored, {} not found on {}", id, source);
        }
        self.persist_if(moved)
    }

    pub fn merge_imported(&mut self, batch: Vec<(DateKey, Event)>) -> usize {
        let offered = batch.len();
        let added = self.schedule.merge_imported(batch);
        info!("imported {} of {} remote event(s)", added, offered);
        self.persist_if(added > 0);
        added
    }

    pub fn recategorize_color(&mut self, category: Category, swatch: Swatch) {
        self.palette.set(category, swatch);
        match serde_json::to_value(&self.palette) {
            Ok(value) => self.write(COLORS_KEY, value),
            Err(err) => warn!("could not serialize palette: {}", err),
        }
    }

    /// Empties the schedule and erases both persisted keys.
    pub fn clear_all(&mut self) {
        self.schedule.clear();
        for key in [EVENTS_KEY, TASKS_KEY] {
            if let Err(err) = self.persistence.remove(key) {
                warn!("could not remove {}: {}", key, err);
            }
        }
    }

    fn persist_if(&mut self, changed: bool) -> bool {
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&mut self) {
        match serde_json::to_value(self.schedule.events()) {
            Ok(value) => self.write(EVENTS_KEY, value),
            Err(err) => warn!("could not serialize events: {}", err),
        }
        match serde_json::to_value(self.schedule.tasks()) {
            Ok(value) => self.write(TASKS_KEY, value),
            Err(err) => warn!("could not serialize tasks: {}", err),
        }
    }

    fn write(&mut self, key: &str, value: serde_json::Value) {
        if let Err(err) = self.persistence.save(key, value) {
            warn!("could not save {}: {}", key, err);
        }
    }
}

fn load_or_default<T: DeserializeOwned + Default>(persistence: &dyn Persistence, key: &str) -> T {
    let value = match persistence.load(key) {
        Ok(Some(value)) => value,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!("could not load {}: {}", key, err);
            return T::default();
        }
    };
    serde_json::from_value(value).unwrap_or_else(|err| {
        warn!("ignoring malformed {}: {}", key, err);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use crate::time::{ClockTime, FixedClock};
    use chrono::Duration;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn draft(title: &str, start: &str, end: &str) -> EventDraft {
        EventDraft {
            title: title.into(),
            start_time: Some(t(start)),
            end_time: Some(t(end)),
            details: None,
        }
    }

    fn today() -> NaiveDate {
        date(2026, 10, 18)
    }

    fn store() -> ScheduleStore {
        ScheduleStore::open(
            Box::new(MemoryStore::new()),
            Box::new(FixedClock::at_midnight(today())),
        )
    }

    #[test]
    fn add_then_lookup_returns_one_incomplete_event() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 20);
        let ids = schedule
            .add_event(day, &draft("Dentist", "10:00", "10:45"), RepeatPolicy::None, today())
            .unwrap();
        assert_eq!(ids.len(), 1);
        let events = schedule.events_on(day);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dentist");
        assert_eq!(events[0].start_time, t("10:00"));
        assert_eq!(events[0].end_time, t("10:45"));
        assert!(!events[0].completed);
        assert!(events[0].series_id.is_none());
    }

    #[test]
    fn invalid_drafts_leave_schedule_untouched() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 20);
        let mut incomplete = draft("Standup", "09:00", "09:30");
        incomplete.start_time = None;
        assert_eq!(
            schedule.add_event(day, &incomplete, RepeatPolicy::Daily, today()),
            Err(ValidationError::MissingStartTime)
        );
        assert_eq!(
            schedule.add_task(day, "   ", RepeatPolicy::None, today()),
            Err(ValidationError::MissingText)
        );
        assert!(schedule.is_empty());
    }

    #[test]
    fn daily_standup_scenario() {
        let mut schedule = Schedule::default();
        let monday = date(2026, 10, 19);
        schedule
            .add_event(monday, &draft("Standup", "09:00", "09:30"), RepeatPolicy::Daily, today())
            .unwrap();
        let all: Vec<(&DateKey, &Event)> = schedule
            .events()
            .iter()
            .flat_map(|(d, list)| list.iter().map(move |e| (d, e)))
            .collect();
        assert!(all.len() >= 13);
        assert!(schedule.events().values().all(|list| list.len() == 1));
        let series = all[0].1.series_id.clone();
        assert!(series.is_some());
        for (_, e) in &all {
            assert_eq!(e.title, "Standup");
            assert_eq!(e.start_time, t("09:00"));
            assert_eq!(e.end_time, t("09:30"));
            assert_eq!(e.category, Category::Personal);
            assert_eq!(e.series_id, series);
        }

        let tuesday = monday + Duration::days(1);
        let id = schedule.events_on(tuesday)[0].id.clone();
        assert!(schedule.toggle_event_complete(tuesday, &id));
        assert!(schedule.events_on(tuesday)[0].completed);
        assert!(!schedule.events_on(monday)[0].completed);
        assert!(!schedule.toggle_event_complete(monday, &id));
    }

    #[test]
    fn weekly_tasks_repeat_with_their_own_series() {
        let mut schedule = Schedule::default();
        let seed = date(2026, 10, 21);
        let ids = schedule
            .add_task(seed, "Water plants", RepeatPolicy::Weekly, today())
            .unwrap();
        assert_eq!(ids.len(), 13);
        assert_eq!(schedule.tasks_on(seed + Duration::days(7))[0].text, "Water plants");
        assert!(schedule.tasks_on(seed + Duration::days(1)).is_empty());
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 22);
        let id = schedule
            .add_event(day, &draft("Run", "07:00", "07:30"), RepeatPolicy::None, today())
            .unwrap()
            .remove(0);
        let before = schedule.events_on(day)[0].completed;
        schedule.toggle_event_complete(day, &id);
        schedule.toggle_event_complete(day, &id);
        assert_eq!(schedule.events_on(day)[0].completed, before);
        assert!(!schedule.toggle_event_complete(day, "missing"));
        assert!(!schedule.toggle_task_complete(day, "missing"));
    }

    #[test]
    fn tasks_keep_creation_order_and_edit_in_place() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 23);
        for text in ["one", "two", "three"] {
            schedule.add_task(day, text, RepeatPolicy::None, today()).unwrap();
        }
        let id = schedule.tasks_on(day)[1].id.clone();
        assert!(schedule.update_task_text(day, &id, "TWO"));
        assert!(schedule.toggle_task_complete(day, &id));
        let texts: Vec<&str> = schedule.tasks_on(day).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["one", "TWO", "three"]);
        assert!(schedule.tasks_on(day)[1].completed);
        assert!(schedule.delete_task(day, &id));
        assert!(!schedule.delete_task(day, &id));
        assert_eq!(schedule.tasks_on(day).len(), 2);
    }

    #[test]
    fn deleting_last_event_drops_the_day() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 23);
        let id = schedule
            .add_event(day, &draft("Errand", "12:00", "12:30"), RepeatPolicy::None, today())
            .unwrap()
            .remove(0);
        assert!(schedule.delete_event(day, &id));
        assert!(!schedule.events().contains_key(&day));
        assert!(!schedule.delete_event(day, &id));
    }

    #[test]
    fn series_edit_ignores_lookalike_events() {
        let mut schedule = Schedule::default();
        let seed = date(2026, 10, 19);
        schedule
            .add_event(seed, &draft("Gym", "18:00", "19:00"), RepeatPolicy::Weekly, today())
            .unwrap();
        let lookalike_day = date(2026, 10, 20);
        schedule
            .add_event(lookalike_day, &draft("Gym", "18:00", "19:00"), RepeatPolicy::None, today())
            .unwrap();

        let id = schedule.events_on(seed)[0].id.clone();
        let edit = EventEdit {
            title: Some("Gym (legs)".into()),
            details: Some("Squat day".into()),
            ..EventEdit::default()
        };
        let changed = schedule.edit_event(seed, &id, &edit, true).unwrap();
        assert_eq!(changed, 14);
        assert_eq!(schedule.events_on(seed + Duration::days(7))[0].title, "Gym (legs)");
        assert_eq!(schedule.events_on(lookalike_day)[0].title, "Gym");
        assert_eq!(schedule.events_on(seed)[0].category, Category::Exercise);
    }

    #[test]
    fn single_edit_touches_one_occurrence() {
        let mut schedule = Schedule::default();
        let seed = date(2026, 10, 19);
        schedule
            .add_event(seed, &draft("Lecture", "10:00", "11:00"), RepeatPolicy::Weekly, today())
            .unwrap();
        let id = schedule.events_on(seed)[0].id.clone();
        let edit = EventEdit {
            start_time: Some(t("10:30")),
            end_time: Some(t("11:30")),
            ..EventEdit::default()
        };
        assert_eq!(schedule.edit_event(seed, &id, &edit, false), Ok(1));
        assert_eq!(schedule.events_on(seed)[0].start_time, t("10:30"));
        assert_eq!(schedule.events_on(seed + Duration::days(7))[0].start_time, t("10:00"));
        assert_eq!(schedule.edit_event(seed, "nope", &edit, true), Ok(0));
    }

    #[test]
    fn relocating_across_days_moves_the_record() {
        let mut schedule = Schedule::default();
        let from = date(2026, 10, 19);
        let to = date(2026, 10, 21);
        let id = schedule
            .add_event(from, &draft("Study", "13:00", "14:30"), RepeatPolicy::None, today())
            .unwrap()
            .remove(0);
        let target = DropTarget {
            date: to,
            hour: 15,
            offset_y: 24.0,
            bucket_height: 48.0,
        };
        assert!(schedule.relocate_event(from, &id, &target));
        assert!(schedule.events_on(from).is_empty());
        let moved = schedule.event(to, &id).unwrap();
        assert_eq!(moved.start_time, t("15:30"));
        assert_eq!(moved.end_time, t("17:00"));
    }

    #[test]
    fn relocating_within_a_day_reappends() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 19);
        let first = schedule
            .add_event(day, &draft("A", "08:00", "09:00"), RepeatPolicy::None, today())
            .unwrap()
            .remove(0);
        schedule
            .add_event(day, &draft("B", "10:00", "11:00"), RepeatPolicy::None, today())
            .unwrap();
        let target = DropTarget {
            date: day,
            hour: 12,
            offset_y: 0.0,
            bucket_height: 48.0,
        };
        assert!(schedule.relocate_event(day, &first, &target));
        let titles: Vec<&str> = schedule.events_on(day).iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["B", "A"]);
    }

    #[test]
    fn wrapped_event_stays_editable_after_a_drop() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 19);
        let id = schedule
            .add_event(day, &draft("Study", "20:00", "22:30"), RepeatPolicy::None, today())
            .unwrap()
            .remove(0);
        let target = DropTarget {
            date: day,
            hour: 22,
            offset_y: 36.0,
            bucket_height: 48.0,
        };
        assert!(schedule.relocate_event(day, &id, &target));
        let moved = schedule.event(day, &id).unwrap();
        assert_eq!((moved.start_time, moved.end_time), (t("22:45"), t("01:15")));

        let rename = EventEdit {
            title: Some("Study group".into()),
            ..EventEdit::default()
        };
        assert_eq!(schedule.edit_event(day, &id, &rename, false), Ok(1));
        let edited = schedule.event(day, &id).unwrap();
        assert_eq!(edited.title, "Study group");
        assert_eq!(edited.duration_minutes(), 150);
    }

    #[test]
    fn series_edit_is_checked_against_every_occurrence() {
        let mut schedule = Schedule::default();
        let seed = date(2026, 10, 19);
        let ids = schedule
            .add_event(seed, &draft("Lecture", "10:00", "11:00"), RepeatPolicy::Weekly, today())
            .unwrap();
        let next_week = seed + Duration::days(7);
        let target = DropTarget {
            date: next_week,
            hour: 14,
            offset_y: 0.0,
            bucket_height: 48.0,
        };
        assert!(schedule.relocate_event(next_week, &ids[1], &target));
        let before = schedule.clone();

        // 14:00 is a fine end for the seed but empties the moved occurrence.
        let edit = EventEdit {
            end_time: Some(t("14:00")),
            ..EventEdit::default()
        };
        assert!(matches!(
            schedule.edit_event(seed, &ids[0], &edit, true),
            Err(ValidationError::EmptyInterval { .. })
        ));
        assert_eq!(schedule, before);
        assert_eq!(schedule.edit_event(seed, &ids[0], &edit, false), Ok(1));
        assert_eq!(schedule.event(seed, &ids[0]).unwrap().end_time, t("14:00"));
    }

    #[test]
    fn stale_drop_is_a_no_op() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 19);
        schedule
            .add_event(day, &draft("A", "08:00", "09:00"), RepeatPolicy::None, today())
            .unwrap();
        let before = schedule.clone();
        let target = DropTarget {
            date: day,
            hour: 3,
            offset_y: 0.0,
            bucket_height: 48.0,
        };
        assert!(!schedule.relocate_event(day, "gone", &target));
        assert_eq!(schedule, before);
    }

    #[test]
    fn imports_are_deduplicated_by_id() {
        let mut schedule = Schedule::default();
        let day = date(2026, 10, 24);
        let remote = Event::new("g-1".into(), "Brunch".into(), t("11:00"), t("12:00"), None);
        assert_eq!(schedule.merge_imported(vec![(day, remote.clone())]), 1);
        assert_eq!(
            schedule.merge_imported(vec![(day, remote.clone()), (day, remote)]),
            0
        );
        assert_eq!(schedule.events_on(day).len(), 1);
    }

    #[test]
    fn store_persists_each_mutation() {
        let mut store = store();
        let day = date(2026, 10, 20);
        store
            .add_event(day, &draft("Party", "20:00", "23:00"), RepeatPolicy::None)
            .unwrap();
        store.add_task(day, "Buy snacks", RepeatPolicy::None).unwrap();

        let events = store.persistence().load(EVENTS_KEY).unwrap().unwrap();
        assert_eq!(events["2026-10-20"][0]["title"], "Party");
        assert_eq!(events["2026-10-20"][0]["category"], "social");
        let tasks = store.persistence().load(TASKS_KEY).unwrap().unwrap();
        assert_eq!(tasks["2026-10-20"][0]["text"], "Buy snacks");
    }

    #[test]
    fn clear_all_erases_persisted_keys() {
        let mut store = store();
        let day = date(2026, 10, 20);
        store
            .add_event(day, &draft("Yoga", "07:00", "08:00"), RepeatPolicy::Weekly)
            .unwrap();
        store.add_task(day, "Stretch", RepeatPolicy::Daily).unwrap();
        store.recategorize_color(Category::Exercise, Swatch::Red);

        store.clear_all();
        assert!(store.schedule().is_empty());
        assert!(store.persistence().load(EVENTS_KEY).unwrap().is_none());
        assert!(store.persistence().load(TASKS_KEY).unwrap().is_none());
        assert!(store.persistence().load(COLORS_KEY).unwrap().is_some());
    }

    #[test]
    fn reopening_restores_schedule_and_palette() {
        let mut backing = MemoryStore::new();
        backing
            .save(
                EVENTS_KEY,
                json!({"2026-10-20": [{"id": "x", "title": "Call", "startTime": "09:00",
                    "endTime": "09:15", "category": "personal", "completed": false}]}),
            )
            .unwrap();
        backing.save(COLORS_KEY, json!({"work": "red"})).unwrap();
        backing.save(TASKS_KEY, json!("not a map")).unwrap();

        let store = ScheduleStore::open(
            Box::new(backing),
            Box::new(FixedClock::at_midnight(today())),
        );
        assert_eq!(store.schedule().events_on(date(2026, 10, 20)).len(), 1);
        assert!(store.schedule().tasks().is_empty());
        assert_eq!(store.palette().swatch(Category::Work), Swatch::Red);
        assert_eq!(store.palette().swatch(Category::Class), Swatch::Orange);
    }

    struct FailingStore;

    impl Persistence for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<serde_json::Value>, StorageError> {
            Err(StorageError::NoDataDir)
        }

        fn save(&mut self, _key: &str, _value: serde_json::Value) -> Result<(), StorageError> {
            Err(StorageError::NoDataDir)
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::NoDataDir)
        }
    }

    #[test]
    fn storage_failures_do_not_reach_callers() {
        let mut store = ScheduleStore::open(
            Box::new(FailingStore),
            Box::new(FixedClock::at_midnight(today())),
        );
        let day = date(2026, 10, 20);
        let ids = store
            .add_event(day, &draft("Shift", "06:00", "14:00"), RepeatPolicy::None)
            .unwrap();
        assert!(store.toggle_event_complete(day, &ids[0]));
        store.clear_all();
        assert!(store.schedule().is_empty());
    }
}
