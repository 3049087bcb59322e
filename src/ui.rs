use crate::drag::{DropPreview, DropTarget};
use crate::form::{EventForm, FormBook, MINUTE_OPTIONS};
use crate::layout::{layout_day, EventBox, LayoutMetrics};
use crate::model::{Event, EventEdit, RecordId, Swatch};
use crate::schedule::ScheduleStore;
use crate::storage::StoreLocation;
use crate::time::{header_label, is_current_hour, start_of_week, week_dates, ClockTime, DateKey};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Timelike};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

/// Terminal rows per hour; one row per quarter hour.
const ROWS_PER_HOUR: u16 = 4;
const GUTTER_WIDTH: u16 = 9;
const TASK_PANEL_WIDTH: u16 = 34;

pub fn run(store: ScheduleStore, location: StoreLocation) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(store, location);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: ScheduleStore,
    location: StoreLocation,
    metrics: LayoutMetrics,
    forms: FormBook,
    week_start: DateKey,
    selected_day: usize,
    selected_event: usize,
    task_cursor: usize,
    focus: Focus,
    top_hour: u8,
    follow_selection: bool,
    last_save: Instant,
    status: String,
    mode: Mode,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    Grid,
    Tasks,
}

enum Mode {
    Normal,
    NewEvent { field: EventField },
    EditEvent(EditForm),
    NewTask,
    EditTask { id: RecordId, text: FieldValue },
    Dragging {
        id: RecordId,
        source: DateKey,
        target: DropTarget,
    },
    Confirm(Confirm),
}

enum Confirm {
    DeleteEvent { date: DateKey, id: RecordId, title: String },
    DeleteTask { date: DateKey, id: RecordId, text: String },
    ClearAll,
    /// Details changed on a repeating event: this occurrence or the series.
    ApplyToAll {
        date: DateKey,
        id: RecordId,
        edit: EventEdit,
    },
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum EventField {
    Title,
    Repeat,
    Start,
    End,
}

impl EventField {
    fn next(self) -> Self {
        match self {
            EventField::Title => EventField::Repeat,
            EventField::Repeat => EventField::Start,
            EventField::Start => EventField::End,
            EventField::End => EventField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            EventField::Title => EventField::End,
            EventField::Repeat => EventField::Title,
            EventField::Start => EventField::Repeat,
            EventField::End => EventField::Start,
        }
    }
}

struct EditForm {
    date: DateKey,
    id: RecordId,
    title: FieldValue,
    start: FieldValue,
    end: FieldValue,
    details: FieldValue,
    field: EditField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum EditField {
    Title,
    Start,
    End,
    Details,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor < self.value.len() {
            self.cursor = next_grapheme(self.cursor, &self.value);
        }
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    fn edit(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) if !has_command_modifier(key) => self.insert_char(c),
            _ => {}
        }
    }
}

impl EditForm {
    fn from_event(date: DateKey, event: &Event) -> Self {
        EditForm {
            date,
            id: event.id.clone(),
            title: FieldValue::new(&event.title),
            start: FieldValue::new(&event.start_time.to_string()),
            end: FieldValue::new(&event.end_time.to_string()),
            details: FieldValue::new(event.details.as_deref().unwrap_or_default()),
            field: EditField::Title,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            EditField::Title => EditField::Start,
            EditField::Start => EditField::End,
            EditField::End => EditField::Details,
            EditField::Details => EditField::Title,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            EditField::Title => EditField::Details,
            EditField::Start => EditField::Title,
            EditField::End => EditField::Start,
            EditField::Details => EditField::End,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            EditField::Title => &mut self.title,
            EditField::Start => &mut self.start,
            EditField::End => &mut self.end,
            EditField::Details => &mut self.details,
        }
    }

    /// Only the fields that differ from `original` end up in the edit.
    fn to_edit(&self, original: &Event) -> Result<EventEdit, String> {
        let title = self.title.value.trim();
        let start: ClockTime = self
            .start
            .value
            .parse()
            .map_err(|err| format!("start: {}", err))?;
        let end: ClockTime = self
            .end
            .value
            .parse()
            .map_err(|err| format!("end: {}", err))?;
        let details = self.details.value.trim();
        let edit = EventEdit {
            title: (title != original.title).then(|| title.to_string()),
            start_time: (start != original.start_time).then_some(start),
            end_time: (end != original.end_time).then_some(end),
            details: (details != original.details.as_deref().unwrap_or_default())
                .then(|| details.to_string()),
        };
        edit.check(original).map_err(|err| err.to_string())?;
        Ok(edit)
    }
}

impl App {
    fn new(store: ScheduleStore, location: StoreLocation) -> Self {
        let now = store.clock().now();
        let status = format!("Loaded calendar from {}", location.path.display());
        App {
            week_start: start_of_week(now.date()),
            selected_day: (now.date() - start_of_week(now.date())).num_days() as usize,
            top_hour: (now.hour() as u8).saturating_sub(1),
            store,
            location,
            metrics: LayoutMetrics {
                pixels_per_quarter_hour: 1.0,
            },
            forms: FormBook::default(),
            selected_event: 0,
            task_cursor: 0,
            focus: Focus::Grid,
            follow_selection: true,
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let TermEvent::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let (next, quit) = match mode {
            Mode::Normal => match self.focus {
                Focus::Grid => self.handle_grid_key(key),
                Focus::Tasks => self.handle_task_panel_key(key),
            },
            Mode::NewEvent { field } => (self.handle_new_event_key(field, key), false),
            Mode::EditEvent(form) => (self.handle_edit_key(form, key), false),
            Mode::NewTask => (self.handle_new_task_key(key), false),
            Mode::EditTask { id, text } => (self.handle_task_edit_key(id, text, key), false),
            Mode::Dragging { id, source, target } => {
                (self.handle_drag_key(id, source, target, key), false)
            }
            Mode::Confirm(confirm) => (self.handle_confirm_key(confirm, key), false),
        };
        self.mode = next;
        self.ensure_bounds();
        quit
    }

    fn handle_grid_key(&mut self, key: KeyEvent) -> (Mode, bool) {
        match key.code {
            KeyCode::Char('q') => return (Mode::Normal, true),
            KeyCode::Tab => {
                self.focus = Focus::Tasks;
                self.status = format!("Tasks for {}", header_label(self.selected_date()));
            }
            KeyCode::Left | KeyCode::Char('h') => self.shift_day(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_day(1),
            KeyCode::Char('[') => self.shift_day(-7),
            KeyCode::Char(']') => self.shift_day(7),
            KeyCode::Char('t') => self.jump_to(self.store.clock().today()),
            KeyCode::Up | KeyCode::Char('k') => self.select_event(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_event(1),
            KeyCode::PageUp => self.scroll(-4),
            KeyCode::PageDown => self.scroll(4),
            KeyCode::Char('a') => {
                let date = self.selected_date();
                if self.forms.toggle_event_form(date) {
                    self.status = format!("New event on {}", header_label(date));
                    return (
                        Mode::NewEvent {
                            field: EventField::Title,
                        },
                        false,
                    );
                }
            }
            KeyCode::Char('e') => match self.current_event() {
                Some(event) => {
                    let form = EditForm::from_event(self.selected_date(), event);
                    self.status = format!("Editing {}", event.title);
                    return (Mode::EditEvent(form), false);
                }
                None => self.status = "No event selected to edit".into(),
            },
            KeyCode::Char('x') | KeyCode::Char(' ') => self.toggle_selected_event(),
            KeyCode::Char('d') => match self.current_event() {
                Some(event) => {
                    let confirm = Confirm::DeleteEvent {
                        date: self.selected_date(),
                        id: event.id.clone(),
                        title: event.title.clone(),
                    };
                    return (Mode::Confirm(confirm), false);
                }
                None => self.status = "No event selected to delete".into(),
            },
            KeyCode::Char('m') => match self.current_event() {
                Some(event) => {
                    let source = self.selected_date();
                    let target =
                        DropTarget::at(source, event.start_time, self.metrics.hour_height());
                    let id = event.id.clone();
                    self.status = format!("Moving {}", event.title);
                    return (Mode::Dragging { id, source, target }, false);
                }
                None => self.status = "No event selected to move".into(),
            },
            KeyCode::Char('c') => self.cycle_category_color(),
            KeyCode::Char('X') => return (Mode::Confirm(Confirm::ClearAll), false),
            _ => {}
        }
        (Mode::Normal, false)
    }

    fn handle_task_panel_key(&mut self, key: KeyEvent) -> (Mode, bool) {
        let date = self.selected_date();
        match key.code {
            KeyCode::Char('q') => return (Mode::Normal, true),
            KeyCode::Tab | KeyCode::Esc => {
                self.focus = Focus::Grid;
                self.status = "Back to the week grid".into();
            }
            KeyCode::Left | KeyCode::Char('h') => self.shift_day(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_day(1),
            KeyCode::Up | KeyCode::Char('k') => self.task_cursor = self.task_cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.task_cursor += 1,
            KeyCode::Char('n') => {
                if self.forms.toggle_task_form(date) {
                    return (Mode::NewTask, false);
                }
            }
            KeyCode::Char('x') | KeyCode::Char(' ') => {
                if let Some(id) = self.current_task_id() {
                    if self.store.toggle_task_complete(date, &id) {
                        self.saved("Toggled task");
                    }
                }
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.store.schedule().tasks_on(date).get(self.task_cursor) {
                    return (
                        Mode::EditTask {
                            id: task.id.clone(),
                            text: FieldValue::new(&task.text),
                        },
                        false,
                    );
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.store.schedule().tasks_on(date).get(self.task_cursor) {
                    let confirm = Confirm::DeleteTask {
                        date,
                        id: task.id.clone(),
                        text: task.text.clone(),
                    };
                    return (Mode::Confirm(confirm), false);
                }
            }
            _ => {}
        }
        (Mode::Normal, false)
    }

    fn handle_new_event_key(&mut self, field: EventField, key: KeyEvent) -> Mode {
        let date = self.selected_date();
        match key.code {
            KeyCode::Esc => {
                self.forms.toggle_event_form(date);
                self.status = "Form hidden; input kept for this day".into();
                return Mode::Normal;
            }
            KeyCode::Enter => {
                return match self.forms.submit_event(date, &mut self.store) {
                    Ok(1) => {
                        self.saved("Added event");
                        Mode::Normal
                    }
                    Ok(n) => {
                        self.saved(format!("Added {} occurrences", n));
                        Mode::Normal
                    }
                    Err(err) => {
                        self.status = format!("Could not add: {}", err);
                        Mode::NewEvent { field }
                    }
                };
            }
            KeyCode::Tab => return Mode::NewEvent { field: field.next() },
            KeyCode::BackTab => return Mode::NewEvent { field: field.prev() },
            _ => {}
        }
        let form = &mut self.forms.day_mut(date).event;
        match field {
            EventField::Title => match key.code {
                KeyCode::Backspace => {
                    form.title.pop();
                }
                KeyCode::Char(c) if !has_command_modifier(key) => form.title.push(c),
                _ => {}
            },
            EventField::Repeat => {
                if matches!(key.code, KeyCode::Up | KeyCode::Down | KeyCode::Char(' ')) {
                    form.repeat = form.repeat.next();
                }
            }
            EventField::Start => match key.code {
                KeyCode::Up => form.set_start_hour(step_hour(form.start_hour, -1)),
                KeyCode::Down => form.set_start_hour(step_hour(form.start_hour, 1)),
                KeyCode::Left => form.set_start_minute(step_minute(form.start_minute, -1)),
                KeyCode::Right => form.set_start_minute(step_minute(form.start_minute, 1)),
                KeyCode::Char('+') => form.nudge_start(1),
                KeyCode::Char('-') => form.nudge_start(-1),
                _ => {}
            },
            EventField::End => match key.code {
                KeyCode::Up => form.set_end_hour(step_hour(form.end_hour, -1)),
                KeyCode::Down => form.set_end_hour(step_hour(form.end_hour, 1)),
                KeyCode::Left => form.set_end_minute(step_minute(form.end_minute, -1)),
                KeyCode::Right => form.set_end_minute(step_minute(form.end_minute, 1)),
                KeyCode::Char('+') => form.nudge_end(1),
                KeyCode::Char('-') => form.nudge_end(-1),
                _ => {}
            },
        }
        Mode::NewEvent { field }
    }

    fn handle_edit_key(&mut self, mut form: EditForm, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Mode::Normal;
            }
            KeyCode::Tab => form.next_field(),
            KeyCode::BackTab => form.prev_field(),
            KeyCode::Enter => return self.submit_edit(form),
            _ => form.active_field_mut().edit(key),
        }
        Mode::EditEvent(form)
    }

    fn submit_edit(&mut self, form: EditForm) -> Mode {
        let Some(original) = self.store.schedule().event(form.date, &form.id).cloned() else {
            self.status = "Event no longer exists".into();
            return Mode::Normal;
        };
        let edit = match form.to_edit(&original) {
            Ok(edit) => edit,
            Err(err) => {
                self.status = format!("Could not save: {}", err);
                return Mode::EditEvent(form);
            }
        };
        if edit.is_empty() {
            self.status = "No changes".into();
            return Mode::Normal;
        }
        if edit.changes_details(&original) && original.series_id.is_some() {
            return Mode::Confirm(Confirm::ApplyToAll {
                date: form.date,
                id: form.id,
                edit,
            });
        }
        self.apply_edit(form.date, &form.id, &edit, false);
        Mode::Normal
    }

    fn apply_edit(&mut self, date: DateKey, id: &str, edit: &EventEdit, all: bool) {
        match self.store.edit_event(date, id, edit, all) {
            Ok(0) => self.status = "Event no longer exists".into(),
            Ok(1) => self.saved("Updated event"),
            Ok(n) => self.saved(format!("Updated {} events in the series", n)),
            Err(err) => self.status = format!("Could not update: {}", err),
        }
    }

    fn handle_new_task_key(&mut self, key: KeyEvent) -> Mode {
        let date = self.selected_date();
        match key.code {
            KeyCode::Esc => {
                self.forms.toggle_task_form(date);
                return Mode::Normal;
            }
            KeyCode::Enter => {
                match self.forms.submit_task(date, &mut self.store) {
                    Ok(n) => self.saved(format!("Added {} task(s)", n)),
                    Err(err) => self.status = format!("Could not add: {}", err),
                }
                return Mode::NewTask;
            }
            _ => {}
        }
        let form = &mut self.forms.day_mut(date).task;
        match key.code {
            KeyCode::Up | KeyCode::Down => form.repeat = form.repeat.next(),
            KeyCode::Backspace => {
                form.text.pop();
            }
            KeyCode::Char(c) if !has_command_modifier(key) => form.text.push(c),
            _ => {}
        }
        Mode::NewTask
    }

    fn handle_task_edit_key(&mut self, id: RecordId, mut text: FieldValue, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                Mode::Normal
            }
            KeyCode::Enter => {
                let trimmed = text.value.trim();
                if trimmed.is_empty() {
                    self.status = "Task text is required".into();
                    return Mode::EditTask { id, text };
                }
                if self
                    .store
                    .update_task_text(self.selected_date(), &id, trimmed)
                {
                    self.saved("Updated task");
                }
                Mode::Normal
            }
            _ => {
                text.edit(key);
                Mode::EditTask { id, text }
            }
        }
    }

    fn handle_drag_key(
        &mut self,
        id: RecordId,
        source: DateKey,
        mut target: DropTarget,
        key: KeyEvent,
    ) -> Mode {
        let bucket = self.metrics.hour_height();
        let start = target.snapped_start();
        match key.code {
            KeyCode::Esc => {
                self.status = "Move canceled".into();
                return Mode::Normal;
            }
            KeyCode::Enter => {
                if self.store.relocate_event(source, &id, &target) {
                    self.jump_to(target.date);
                    self.select_by_id(&id);
                    self.saved(format!("Moved to {}", start.display_12h()));
                } else {
                    self.status = "Event no longer exists".into();
                }
                return Mode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                target = DropTarget::at(target.date, start.add_minutes(-15), bucket)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                target = DropTarget::at(target.date, start.add_minutes(15), bucket)
            }
            KeyCode::Left | KeyCode::Char('h') => {
                target = DropTarget::at(target.date - ChronoDuration::days(1), start, bucket)
            }
            KeyCode::Right | KeyCode::Char('l') => {
                target = DropTarget::at(target.date + ChronoDuration::days(1), start, bucket)
            }
            _ => {}
        }
        self.jump_to(target.date);
        let preview = DropPreview::of(&target);
        self.status = format!(
            "Drop on {} at {} (Enter drop, Esc cancel)",
            header_label(preview.date),
            ClockTime::from_minutes(preview.hour as i32 * 60 + preview.minute as i32)
                .display_12h()
        );
        Mode::Dragging { id, source, target }
    }

    fn handle_confirm_key(&mut self, confirm: Confirm, key: KeyEvent) -> Mode {
        let accepted = match key.code {
            KeyCode::Char('y') | KeyCode::Enter => true,
            KeyCode::Char('n') => false,
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Mode::Normal;
            }
            _ => return Mode::Confirm(confirm),
        };
        match confirm {
            Confirm::ApplyToAll { date, id, edit } => self.apply_edit(date, &id, &edit, accepted),
            _ if !accepted => self.status = "Canceled".into(),
            Confirm::DeleteEvent { date, id, title } => {
                if self.store.delete_event(date, &id) {
                    self.saved(format!("Deleted {}", title));
                }
            }
            Confirm::DeleteTask { date, id, text } => {
                if self.store.delete_task(date, &id) {
                    self.saved(format!("Deleted task {}", text));
                }
            }
            Confirm::ClearAll => {
                self.store.clear_all();
                self.saved("Cleared all events and tasks");
            }
        }
        Mode::Normal
    }

    fn toggle_selected_event(&mut self) {
        let date = self.selected_date();
        let Some(id) = self.current_event().map(|e| e.id.clone()) else {
            self.status = "No event selected".into();
            return;
        };
        if self.store.toggle_event_complete(date, &id) {
            let done = self
                .store
                .schedule()
                .event(date, &id)
                .map_or(false, |e| e.completed);
            self.saved(if done { "Marked done" } else { "Marked not done" });
        }
    }

    fn cycle_category_color(&mut self) {
        let Some(category) = self.current_event().map(|e| e.category) else {
            self.status = "Select an event to recolor its category".into();
            return;
        };
        let current = self.store.palette().swatch(category);
        let idx = Swatch::ALL.iter().position(|&s| s == current).unwrap_or(0);
        let next = Swatch::ALL[(idx + 1) % Swatch::ALL.len()];
        self.store.recategorize_color(category, next);
        self.saved(format!("{} events are now {}", category.label(), next.label()));
    }

    fn selected_date(&self) -> DateKey {
        self.week_start + ChronoDuration::days(self.selected_day as i64)
    }

    /// The selected day's events ordered by start time.
    fn day_events(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .store
            .schedule()
            .events_on(self.selected_date())
            .iter()
            .collect();
        events.sort_by_key(|e| e.start_time);
        events
    }

    fn current_event(&self) -> Option<&Event> {
        self.day_events().get(self.selected_event).copied()
    }

    fn current_task_id(&self) -> Option<RecordId> {
        self.store
            .schedule()
            .tasks_on(self.selected_date())
            .get(self.task_cursor)
            .map(|t| t.id.clone())
    }

    fn select_by_id(&mut self, id: &str) {
        if let Some(idx) = self.day_events().iter().position(|e| e.id == id) {
            self.selected_event = idx;
            self.follow_selection = true;
        }
    }

    fn shift_day(&mut self, days: i64) {
        self.jump_to(self.selected_date() + ChronoDuration::days(days));
    }

    fn jump_to(&mut self, date: DateKey) {
        if date != self.selected_date() {
            self.selected_event = 0;
            self.task_cursor = 0;
        }
        self.week_start = start_of_week(date);
        self.selected_day = (date - self.week_start).num_days() as usize;
        self.follow_selection = true;
    }

    fn select_event(&mut self, delta: isize) {
        let count = self.day_events().len();
        if count == 0 {
            return;
        }
        let next = (self.selected_event as isize + delta).clamp(0, count as isize - 1);
        self.selected_event = next as usize;
        self.follow_selection = true;
    }

    fn scroll(&mut self, hours: i32) {
        self.top_hour = (self.top_hour as i32 + hours).clamp(0, 23) as u8;
        self.follow_selection = false;
    }

    fn ensure_bounds(&mut self) {
        let events = self.day_events().len();
        if self.selected_event >= events {
            self.selected_event = events.saturating_sub(1);
        }
        let tasks = self.store.schedule().tasks_on(self.selected_date()).len();
        if self.task_cursor >= tasks {
            self.task_cursor = tasks.saturating_sub(1);
        }
    }

    /// Scrolls so the selected event (or drop marker) is inside the
    /// `visible` hours shown.
    fn ensure_hour_visible(&mut self, visible: u8) {
        let focus_hour = match &self.mode {
            Mode::Dragging { target, .. } => Some(target.snapped_start().hour()),
            _ if self.follow_selection => self.current_event().map(|e| e.start_time.hour()),
            _ => None,
        };
        if let Some(hour) = focus_hour {
            if hour < self.top_hour {
                self.top_hour = hour;
            } else if visible > 0 && hour >= self.top_hour + visible {
                self.top_hour = hour + 1 - visible;
            }
        }
        self.top_hour = self.top_hour.min(24u8.saturating_sub(visible.max(1)));
    }

    fn saved(&mut self, message: impl Into<String>) {
        self.last_save = Instant::now();
        self.status = message.into();
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(TASK_PANEL_WIDTH)])
            .split(layout[1]);

        self.draw_header(f, layout[0]);
        self.draw_week(f, body[0]);
        self.draw_tasks(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::NewEvent { field } => {
                if let Some(day) = self.forms.get(self.selected_date()) {
                    self.draw_event_form(f, &day.event, *field);
                }
            }
            Mode::EditEvent(form) => self.draw_edit_form(f, form),
            Mode::Confirm(confirm) => self.draw_confirm(f, confirm),
            _ => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "weekgrid ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("week of {}", header_label(self.week_start)),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(self.location.scope_label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_week(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let mut constraints = vec![Constraint::Length(GUTTER_WIDTH)];
        constraints.extend((0..7).map(|_| Constraint::Ratio(1, 7)));
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let visible = (area.height.saturating_sub(2) / ROWS_PER_HOUR).min(24) as u8;
        self.ensure_hour_visible(visible);
        let hours = self.top_hour..(self.top_hour + visible).min(24);

        let gutter_block = Block::default()
            .borders(Borders::TOP | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let gutter = gutter_block.inner(columns[0]);
        f.render_widget(gutter_block, columns[0]);
        let today = self.store.clock().today();
        for hour in hours.clone() {
            let y = gutter.y + (hour - self.top_hour) as u16 * ROWS_PER_HOUR;
            let label = ClockTime::from_minutes(hour as i32 * 60).display_12h();
            let style = if is_current_hour(self.store.clock(), today, hour) {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            f.render_widget(
                Paragraph::new(Span::styled(label, style)),
                Rect::new(gutter.x, y, gutter.width, 1),
            );
        }

        for (idx, day) in week_dates(self.week_start).into_iter().enumerate() {
            self.draw_day(f, columns[idx + 1], idx, day, hours.clone());
        }
    }

    fn draw_day(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        idx: usize,
        day: DateKey,
        hours: std::ops::Range<u8>,
    ) {
        let clock = self.store.clock();
        let selected = idx == self.selected_day;
        let accent = if selected {
            Color::Cyan
        } else if day == clock.today() {
            Color::Yellow
        } else {
            Color::DarkGray
        };
        let block = Block::default()
            .title(Span::styled(
                header_label(day),
                Style::default().fg(accent).add_modifier(if selected {
                    Modifier::BOLD | Modifier::UNDERLINED
                } else {
                    Modifier::BOLD
                }),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent))
            .style(Style::default().bg(Color::Rgb(16, 18, 24)));
        let inner = block.inner(area);
        f.render_widget(block, area);

        for hour in hours {
            let y = inner.y + (hour - self.top_hour) as u16 * ROWS_PER_HOUR;
            let row = Rect::new(inner.x, y, inner.width, ROWS_PER_HOUR).intersection(inner);
            if is_current_hour(clock, day, hour) {
                f.render_widget(
                    Block::default().style(Style::default().bg(Color::Rgb(40, 36, 16))),
                    row,
                );
            }
            f.render_widget(
                Paragraph::new(Span::styled(
                    "┈".repeat(inner.width as usize),
                    Style::default().fg(Color::Rgb(44, 48, 58)),
                )),
                Rect::new(inner.x, y, inner.width, 1).intersection(inner),
            );
        }

        let selected_id = selected.then(|| self.current_event().map(|e| e.id.as_str())).flatten();
        let events = self.store.schedule().events_on(day);
        for b in layout_day(events, &self.metrics) {
            let Some(rect) = event_rect(inner, self.top_hour, &b) else {
                continue;
            };
            let swatch = self.store.palette().swatch(b.event.category);
            let mut style = Style::default().bg(swatch_color(swatch)).fg(Color::Black);
            if b.event.completed {
                style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
            }
            if selected_id == Some(b.event.id.as_str()) {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            let lines = vec![
                Line::from(truncate_text(&b.event.title, rect.width as usize)),
                Line::from(format!(
                    "{}-{}",
                    b.event.start_time.display_12h(),
                    b.event.end_time.display_12h()
                )),
            ];
            f.render_widget(Paragraph::new(lines).style(style), rect);
        }

        if let Mode::Dragging { target, .. } = &self.mode {
            let preview = DropPreview::of(target);
            if preview.date == day && preview.hour >= self.top_hour {
                let offset = (preview.row_fraction() * ROWS_PER_HOUR as f32).round() as u16;
                let y = inner.y + (preview.hour - self.top_hour) as u16 * ROWS_PER_HOUR + offset;
                if y < inner.bottom() {
                    let at = ClockTime::from_minutes(
                        preview.hour as i32 * 60 + preview.minute as i32,
                    );
                    f.render_widget(
                        Paragraph::new(Span::styled(
                            format!("▶ {}", at.display_12h()),
                            Style::default()
                                .fg(Color::LightMagenta)
                                .add_modifier(Modifier::BOLD),
                        )),
                        Rect::new(inner.x, y, inner.width, 1),
                    );
                }
            }
        }
    }

    fn draw_tasks(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let date = self.selected_date();
        let focused = self.focus == Focus::Tasks;
        let accent = if focused { Color::LightGreen } else { Color::DarkGray };
        let mut items: Vec<ListItem> = self
            .store
            .schedule()
            .tasks_on(date)
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let text = match &self.mode {
                    Mode::EditTask { id, text } if *id == task.id => text.with_caret(),
                    _ => task.text.clone(),
                };
                let mark = if task.completed { "[x] " } else { "[ ] " };
                let mut style = Style::default();
                if task.completed {
                    style = style.fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT);
                }
                if focused && idx == self.task_cursor {
                    style = style.bg(Color::LightGreen).fg(Color::Black);
                }
                ListItem::new(Line::from(vec![
                    Span::styled(mark, style),
                    Span::styled(text, style),
                ]))
            })
            .collect();
        if let Some(form) = self.forms.get(date).map(|d| &d.task).filter(|t| t.visible) {
            let caret = if matches!(self.mode, Mode::NewTask) { "▌" } else { "" };
            items.push(ListItem::new(Line::from(vec![
                Span::styled("+ ", Style::default().fg(Color::LightMagenta)),
                Span::raw(format!("{}{}", form.text, caret)),
                Span::styled(
                    format!("  ({})", form.repeat.label()),
                    Style::default().fg(Color::DarkGray),
                ),
            ])));
        }
        if items.is_empty() {
            items.push(ListItem::new(Span::styled(
                "No tasks",
                Style::default().fg(Color::DarkGray),
            )));
        }
        let mut state = ListState::default();
        if focused {
            state.select(Some(self.task_cursor));
        }
        let list = List::new(items).block(
            Block::default()
                .title(Span::styled(
                    format!("Tasks • {}", header_label(date)),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent)),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.selected_event_detail())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let keys: &[(&str, &str, Color)] = match (&self.mode, self.focus) {
            (Mode::Dragging { .. }, _) => &[
                ("↑↓", " quarter hour  ", Color::LightCyan),
                ("←→", " day  ", Color::LightCyan),
                ("Enter", " drop  ", Color::LightGreen),
                ("Esc", " cancel", Color::LightRed),
            ],
            (Mode::NewEvent { .. }, _) => &[
                ("Tab", " field  ", Color::LightCyan),
                ("↑↓", " hour/repeat  ", Color::LightCyan),
                ("←→", " minute  ", Color::LightCyan),
                ("+/-", " quarter hour  ", Color::LightCyan),
                ("Enter", " add  ", Color::LightGreen),
                ("Esc", " hide", Color::LightRed),
            ],
            (Mode::Normal, Focus::Tasks) => &[
                ("↑↓", " select  ", Color::LightCyan),
                ("←→", " day  ", Color::LightCyan),
                ("n", " new  ", Color::LightMagenta),
                ("x", " done  ", Color::LightGreen),
                ("e", " edit  ", Color::LightYellow),
                ("d", " delete  ", Color::LightRed),
                ("Tab", " grid  ", Color::LightCyan),
                ("q", " quit", Color::LightRed),
            ],
            (Mode::Normal, Focus::Grid) => &[
                ("←→", " day  ", Color::LightCyan),
                ("[ ]", " week  ", Color::LightCyan),
                ("↑↓", " event  ", Color::LightCyan),
                ("a", " add  ", Color::LightMagenta),
                ("e", " edit  ", Color::LightYellow),
                ("m", " move  ", Color::LightGreen),
                ("x", " done  ", Color::LightGreen),
                ("c", " color  ", Color::LightYellow),
                ("d", " delete  ", Color::LightRed),
                ("Tab", " tasks  ", Color::LightCyan),
                ("q", " quit", Color::LightRed),
            ],
            _ => &[
                ("Enter", " confirm  ", Color::LightGreen),
                ("Esc", " cancel", Color::LightRed),
            ],
        };
        let spans = keys
            .iter()
            .flat_map(|(key, label, color)| {
                [
                    Span::styled(key.to_string(), Style::default().fg(*color)),
                    Span::raw(label.to_string()),
                ]
            })
            .collect::<Vec<_>>();
        Line::from(spans)
    }

    fn selected_event_detail(&self) -> Vec<Line<'static>> {
        let Some(event) = self.current_event() else {
            return vec![Line::from("No event selected")];
        };
        let mut spans = vec![
            Span::styled(
                event.title.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!(
                    "{}-{}",
                    event.start_time.display_12h(),
                    event.end_time.display_12h()
                ),
                Style::default().fg(Color::LightCyan),
            ),
            Span::raw("  "),
            Span::styled(
                event.category.label().to_string(),
                Style::default().fg(swatch_color(self.store.palette().swatch(event.category))),
            ),
        ];
        if event.series_id.is_some() {
            spans.push(Span::styled("  ↻", Style::default().fg(Color::LightMagenta)));
        }
        if let Some(details) = &event.details {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                details.clone(),
                Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            ));
        }
        vec![Line::from(spans)]
    }

    fn draw_event_form(&self, f: &mut ratatui::Frame<'_>, form: &EventForm, field: EventField) {
        let area = centered_rect(60, 40, f.size());
        let time = |t: Option<ClockTime>| t.map_or("--:--".to_string(), ClockTime::display_12h);
        let title = if field == EventField::Title {
            format!("{}▌", form.title)
        } else {
            form.title.clone()
        };
        let lines = vec![
            form_line("Title", title, field == EventField::Title),
            form_line(
                "Repeat",
                form.repeat.label().to_string(),
                field == EventField::Repeat,
            ),
            form_line("Start", time(form.start_time()), field == EventField::Start),
            form_line("End", time(form.end_time()), field == EventField::End),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to add • Esc to hide • Tab/Shift-Tab to move",
                Style::default().fg(Color::Gray),
            )),
        ];
        let heading = format!("New event • {}", header_label(self.selected_date()));
        render_dialog(f, area, &heading, lines, Color::Cyan);
    }

    fn draw_edit_form(&self, f: &mut ratatui::Frame<'_>, form: &EditForm) {
        let area = centered_rect(60, 40, f.size());
        let field = |label: &str, value: &FieldValue, which: EditField| {
            let active = form.field == which;
            let text = if active {
                value.with_caret()
            } else {
                value.value.clone()
            };
            form_line(label, text, active)
        };
        let lines = vec![
            field("Title", &form.title, EditField::Title),
            field("Start", &form.start, EditField::Start),
            field("End", &form.end, EditField::End),
            field("Details", &form.details, EditField::Details),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save • Esc to cancel • times as HH:MM or 9:30 am",
                Style::default().fg(Color::Gray),
            )),
        ];
        render_dialog(f, area, "Edit event", lines, Color::LightYellow);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, confirm: &Confirm) {
        let area = centered_rect(50, 30, f.size());
        let (heading, question, hint) = match confirm {
            Confirm::DeleteEvent { title, .. } => (
                "Confirm Delete",
                format!("Delete \"{}\"?", title),
                "Press y to confirm, n or Esc to cancel",
            ),
            Confirm::DeleteTask { text, .. } => (
                "Confirm Delete",
                format!("Delete task \"{}\"?", text),
                "Press y to confirm, n or Esc to cancel",
            ),
            Confirm::ClearAll => (
                "Clear Everything",
                "Delete every event and task?".to_string(),
                "Press y to confirm, n or Esc to cancel",
            ),
            Confirm::ApplyToAll { .. } => (
                "Repeating Event",
                "Apply these changes to all occurrences?".to_string(),
                "y all occurrences • n only this one • Esc cancel",
            ),
        };
        let body = vec![
            Line::from(Span::styled(
                question,
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(hint),
        ];
        render_dialog(f, area, heading, body, Color::LightRed);
    }
}

/// Terminal cells covered by an event box, clipped to the visible hours.
fn event_rect(inner: Rect, top_hour: u8, b: &EventBox<'_>) -> Option<Rect> {
    let row = (b.hour as i32 - top_hour as i32) * ROWS_PER_HOUR as i32 + b.top_px.round() as i32;
    let rows = (b.height_px.round() as i32).max(1);
    let top = (inner.y as i32 + row).max(inner.y as i32);
    let bottom = (inner.y as i32 + row + rows).min(inner.bottom() as i32);
    if top >= bottom {
        return None;
    }
    let left = inner.x + (inner.width as f32 * b.left_pct / 100.0).round() as u16;
    let width = ((inner.width as f32 * b.width_pct / 100.0).round() as u16)
        .max(1)
        .min(inner.right().saturating_sub(left));
    if width == 0 {
        return None;
    }
    Some(Rect::new(left, top as u16, width, (bottom - top) as u16))
}

fn swatch_color(swatch: Swatch) -> Color {
    match swatch {
        Swatch::Blue => Color::Rgb(96, 165, 250),
        Swatch::Orange => Color::Rgb(251, 146, 60),
        Swatch::Green => Color::Rgb(74, 222, 128),
        Swatch::Purple => Color::Rgb(192, 132, 252),
        Swatch::Yellow => Color::Rgb(250, 204, 21),
        Swatch::Pink => Color::Rgb(244, 114, 182),
        Swatch::Red => Color::Rgb(248, 113, 113),
    }
}

fn step_hour(current: Option<u8>, delta: i32) -> u8 {
    match current {
        Some(hour) => (hour as i32 + delta).rem_euclid(24) as u8,
        None => 9,
    }
}

fn step_minute(current: Option<u8>, delta: i32) -> u8 {
    let len = MINUTE_OPTIONS.len() as i32;
    let idx = current
        .and_then(|m| MINUTE_OPTIONS.iter().position(|&o| o == m))
        .map_or(0, |i| (i as i32 + delta).rem_euclid(len));
    MINUTE_OPTIONS[idx as usize]
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn render_dialog(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    lines: Vec<Line<'static>>,
    accent: Color,
) {
    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn form_line(label: &str, value: String, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    Line::from(vec![
        Span::styled(format!("{:<8}", format!("{}:", label)), label_style),
        Span::styled(value, value_style),
    ])
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map_or(0, |(idx, _)| idx)
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map_or(text.len(), |ch| cursor + ch.len_utf8())
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
