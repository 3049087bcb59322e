use crate::cli::GlobalOpts;
use crate::config::{load_config, Config, ImportConfig};
use crate::drag::DropTarget;
use crate::import::{import_upcoming, ImportError};
use crate::layout::layout_day;
use crate::model::{Category, Event, EventDraft, EventEdit, RepeatPolicy, Swatch, Task};
use crate::schedule::ScheduleStore;
use crate::storage::{init_project_store, locate_store, FileStore, StoreLocation};
use crate::time::{
    header_label, parse_date_key, start_of_week, week_dates, Clock, ClockTime, DateKey,
    FixedClock, SystemClock,
};
use crate::ui;
use anyhow::{bail, Context, Result};
use chrono::Duration;
use log::warn;
use std::env;
use tokio::runtime::Runtime;

/// Everything a command needs: the opened store, where it lives, and the
/// user's settings.
struct Session {
    store: ScheduleStore,
    location: StoreLocation,
    config: Config,
}

impl Session {
    fn today(&self) -> DateKey {
        self.store.clock().today()
    }

    fn date(&self, input: Option<&str>) -> Result<DateKey> {
        resolve_date(input, self.today())
    }
}

pub fn init() -> Result<()> {
    let location = init_project_store()?;
    println!("Initialized calendar at {}", location.path.display());
    Ok(())
}

pub fn week(opts: &GlobalOpts, date: Option<String>) -> Result<()> {
    let session = open_session(opts)?;
    let anchor = session.date(date.as_deref())?;
    let schedule = session.store.schedule();
    println!(
        "Calendar: {} ({})",
        session.location.path.display(),
        session.location.scope_label()
    );
    if schedule.is_empty() {
        println!("Nothing scheduled yet; try `weekgrid add-event`\n");
    }
    for day in week_dates(start_of_week(anchor)) {
        let marker = if day == session.today() { " *" } else { "" };
        println!("{}{}", header_label(day), marker);
        let mut events: Vec<&Event> = schedule.events_on(day).iter().collect();
        events.sort_by_key(|e| e.start_time);
        let tasks = schedule.tasks_on(day);
        if events.is_empty() && tasks.is_empty() {
            println!("  (nothing planned)");
        }
        for event in events {
            print_event(event);
        }
        for task in tasks {
            print_task(task);
        }
        println!();
    }
    Ok(())
}

pub fn add_event(
    opts: &GlobalOpts,
    title: String,
    date: Option<String>,
    start: Option<ClockTime>,
    end: Option<ClockTime>,
    repeat: RepeatPolicy,
    details: Option<String>,
) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    let draft = EventDraft {
        title,
        start_time: start,
        end_time: end.or_else(|| start.map(|s| s.add_minutes(60))),
        details: details.filter(|d| !d.trim().is_empty()),
    };
    let ids = session
        .store
        .add_event(day, &draft, repeat)
        .with_context(|| format!("adding event on {}", day))?;
    match ids.as_slice() {
        [id] => println!("Added event {} on {}", id, day),
        _ => println!(
            "Added {} {} occurrences starting {}",
            ids.len(),
            repeat.label(),
            day
        ),
    }
    Ok(())
}

pub fn add_task(
    opts: &GlobalOpts,
    text: String,
    date: Option<String>,
    repeat: RepeatPolicy,
) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    let ids = session
        .store
        .add_task(day, &text, repeat)
        .with_context(|| format!("adding task on {}", day))?;
    match ids.as_slice() {
        [id] => println!("Added task {} on {}", id, day),
        _ => println!("Added {} tasks starting {}", ids.len(), day),
    }
    Ok(())
}

pub fn toggle(opts: &GlobalOpts, id: String, date: Option<String>) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    if !session.store.toggle_event_complete(day, &id) {
        println!("No event {} on {}", id, day);
        return Ok(());
    }
    let done = session
        .store
        .schedule()
        .event(day, &id)
        .map_or(false, |e| e.completed);
    println!("Event {} marked {}", id, if done { "done" } else { "not done" });
    Ok(())
}

pub fn toggle_task(opts: &GlobalOpts, id: String, date: Option<String>) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    if session.store.toggle_task_complete(day, &id) {
        println!("Toggled task {}", id);
    } else {
        println!("No task {} on {}", id, day);
    }
    Ok(())
}

pub fn delete(opts: &GlobalOpts, id: String, date: Option<String>) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    if session.store.delete_event(day, &id) {
        println!("Deleted event {}", id);
    } else {
        println!("No event {} on {}", id, day);
    }
    Ok(())
}

pub fn delete_task(opts: &GlobalOpts, id: String, date: Option<String>) -> Result<()> {
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    if session.store.delete_task(day, &id) {
        println!("Deleted task {}", id);
    } else {
        println!("No task {} on {}", id, day);
    }
    Ok(())
}

pub fn edit_task(opts: &GlobalOpts, id: String, text: String, date: Option<String>) -> Result<()> {
    if text.trim().is_empty() {
        bail!("task text is required");
    }
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    if session.store.update_task_text(day, &id, text.trim()) {
        println!("Updated task {}", id);
    } else {
        println!("No task {} on {}", id, day);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    opts: &GlobalOpts,
    id: String,
    date: Option<String>,
    title: Option<String>,
    start: Option<ClockTime>,
    end: Option<ClockTime>,
    details: Option<String>,
    all: bool,
) -> Result<()> {
    let edit = EventEdit {
        title: title.map(|t| t.trim().to_string()),
        start_time: start,
        end_time: end,
        details,
    };
    if edit.is_empty() {
        bail!("nothing to change (use --title, --start, --end or --details)");
    }
    let mut session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    let Some(original) = session.store.schedule().event(day, &id).cloned() else {
        println!("No event {} on {}", id, day);
        return Ok(());
    };
    if edit.changes_details(&original) && original.series_id.is_some() && !all {
        println!("Note: only this occurrence changes; pass --all to update the whole series");
    }
    let changed = session.store.edit_event(day, &id, &edit, all)?;
    println!("Updated {} event(s)", changed);
    Ok(())
}

pub fn move_event(
    opts: &GlobalOpts,
    id: String,
    date: Option<String>,
    to: Option<String>,
    at: ClockTime,
) -> Result<()> {
    let mut session = open_session(opts)?;
    let source = session.date(date.as_deref())?;
    let target_day = match to {
        Some(raw) => session.date(Some(raw.as_str()))?,
        None => source,
    };
    let bucket_height = session.config.layout_metrics().hour_height();
    let target = DropTarget::at(target_day, at, bucket_height);
    if !session.store.relocate_event(source, &id, &target) {
        println!("No event {} on {}", id, source);
        return Ok(());
    }
    if let Some(moved) = session.store.schedule().event(target_day, &id) {
        println!(
            "Moved {} to {} {}-{}",
            id,
            target_day,
            moved.start_time.display_12h(),
            moved.end_time.display_12h()
        );
    }
    Ok(())
}

pub fn layout(opts: &GlobalOpts, date: Option<String>, hour: Option<u8>) -> Result<()> {
    if let Some(h) = hour {
        if h > 23 {
            bail!("hour must be between 0 and 23: {}", h);
        }
    }
    let session = open_session(opts)?;
    let day = session.date(date.as_deref())?;
    let metrics = session.config.layout_metrics();
    let events = session.store.schedule().events_on(day);
    let boxes: Vec<_> = layout_day(events, &metrics)
        .into_iter()
        .filter(|b| hour.map_or(true, |h| b.hour == h))
        .collect();
    println!("{}", header_label(day));
    if boxes.is_empty() {
        println!("  (no events)");
    }
    for b in boxes {
        println!(
            "  {:02}:00  {} {:<24} col {}/{}  left {:>5.1}%  width {:>5.1}%  top {:>5.1}px  height {:>6.1}px",
            b.hour,
            b.event.id,
            b.event.title,
            b.column + 1,
            b.group_size,
            b.left_pct,
            b.width_pct,
            b.top_px,
            b.height_px
        );
    }
    Ok(())
}

pub fn color(opts: &GlobalOpts, category: Category, color: Swatch) -> Result<()> {
    let mut session = open_session(opts)?;
    session.store.recategorize_color(category, color);
    println!("{} events are now {}", category.label(), color.label());
    Ok(())
}

pub fn clear(opts: &GlobalOpts, yes: bool) -> Result<()> {
    if !yes {
        bail!("this deletes every event and task; rerun with --yes to confirm");
    }
    let mut session = open_session(opts)?;
    session.store.clear_all();
    println!("Cleared all events and tasks");
    Ok(())
}

pub fn import(opts: &GlobalOpts, token: Option<String>) -> Result<()> {
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        println!("Not signed in; pass --token or set WEEKGRID_GOOGLE_TOKEN");
        return Ok(());
    };
    let mut session = open_session(opts)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    match import_into(&runtime, &mut session.store, session.config.import.clone(), &token) {
        Ok((offered, added)) => println!(
            "Imported {} new event(s); {} already present",
            added,
            offered - added
        ),
        Err(err) => println!("Import failed: {}", err),
    }
    Ok(())
}

/// Fetches upcoming remote events and merges them into `store`, returning
/// how many were offered and how many were new. A failed fetch is logged and
/// leaves the store untouched.
fn import_into(
    runtime: &Runtime,
    store: &mut ScheduleStore,
    config: ImportConfig,
    token: &str,
) -> Result<(usize, usize), ImportError> {
    let now = store.clock().now();
    match runtime.block_on(import_upcoming(config, token, now)) {
        Ok(batch) => {
            let offered = batch.len();
            Ok((offered, store.merge_imported(batch)))
        }
        Err(err) => {
            warn!("calendar import failed: {}", err);
            Err(err)
        }
    }
}

pub fn tui(opts: &GlobalOpts) -> Result<()> {
    let session = open_session(opts)?;
    ui::run(session.store, session.location)
}

fn open_session(opts: &GlobalOpts) -> Result<Session> {
    let config = load_config(opts.config.as_deref())?;
    let clock: Box<dyn Clock> = match opts.today.as_deref() {
        Some(raw) => Box::new(FixedClock::at_midnight(
            parse_date_key(raw).context("parsing --today")?,
        )),
        None => Box::new(SystemClock),
    };
    let cwd = env::current_dir()?;
    let file = FileStore::new(locate_store(&cwd)?);
    let location = file.location().clone();
    let store = ScheduleStore::open(Box::new(file), clock);
    Ok(Session {
        store,
        location,
        config,
    })
}

/// `today`, `tomorrow`, `yesterday` or `YYYY-MM-DD`; missing means today.
fn resolve_date(input: Option<&str>, today: DateKey) -> Result<DateKey> {
    let raw = match input.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(today),
    };
    match raw.to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "tomorrow" => Ok(today + Duration::days(1)),
        "yesterday" => Ok(today - Duration::days(1)),
        _ => parse_date_key(raw)
            .with_context(|| format!("invalid date (use YYYY-MM-DD, today or tomorrow): {}", raw)),
    }
}

fn print_event(event: &Event) {
    let mark = if event.completed { "x" } else { " " };
    println!(
        "  [{}] {} {}-{}  {} ({})",
        mark,
        event.id,
        event.start_time.display_12h(),
        event.end_time.display_12h(),
        event.title,
        event.category
    );
    if let Some(details) = &event.details {
        println!("        {}", details);
    }
}

fn print_task(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("  [{}] {} task: {}", mark, task.id, task.text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use std::net::TcpListener;

    fn day(d: u32) -> DateKey {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn relative_dates_follow_the_clock() {
        assert_eq!(resolve_date(None, day(19)).unwrap(), day(19));
        assert_eq!(resolve_date(Some(""), day(19)).unwrap(), day(19));
        assert_eq!(resolve_date(Some("Tomorrow"), day(19)).unwrap(), day(20));
        assert_eq!(resolve_date(Some("yesterday"), day(19)).unwrap(), day(18));
        assert_eq!(resolve_date(Some("2026-10-01"), day(19)).unwrap(), day(1));
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(resolve_date(Some("10/19/2026"), day(19)).is_err());
        assert!(resolve_date(Some("next week"), day(19)).is_err());
    }

    #[test]
    fn failed_import_leaves_the_store_alone() {
        let mut store = ScheduleStore::open(
            Box::new(MemoryStore::new()),
            Box::new(FixedClock::at_midnight(day(19))),
        );
        let draft = EventDraft {
            title: "Standup".into(),
            start_time: Some("09:00".parse().unwrap()),
            end_time: Some("09:15".parse().unwrap()),
            details: None,
        };
        store.add_event(day(19), &draft, RepeatPolicy::None).unwrap();
        let before = store.schedule().clone();

        // Nothing listens on a port once its listener is dropped.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ImportConfig {
            api_base: format!("http://127.0.0.1:{}", port),
            timeout_secs: 2,
            ..ImportConfig::default()
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let result = import_into(&runtime, &mut store, config, "token");
        assert!(matches!(
            result,
            Err(ImportError::Request(_) | ImportError::Timeout(_))
        ));
        assert_eq!(store.schedule(), &before);
    }
}
