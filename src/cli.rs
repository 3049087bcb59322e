use crate::model::{Category, RepeatPolicy, Swatch};
use crate::time::ClockTime;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "weekgrid", version, about = "Weekly calendar planner for the terminal")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub today: Option<String>,
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a calendar file for the current directory
    Init,
    /// Print the week containing a date
    Week {
        /// Any day of the week (YYYY-MM-DD, today, tomorrow); defaults to today
        date: Option<String>,
    },
    /// Add a timed event
    AddEvent {
        /// Event title; also decides the category
        title: String,
        /// Day of the event (defaults to today)
        #[arg(long, short = 'd')]
        date: Option<String>,
        /// Start time, HH:MM or h:mm am/pm
        #[arg(long, short = 's')]
        start: Option<ClockTime>,
        /// End time (defaults to one hour after the start)
        #[arg(long, short = 'e')]
        end: Option<ClockTime>,
        /// none, daily or weekly
        #[arg(long, short = 'r', default_value = "none")]
        repeat: RepeatPolicy,
        /// Free-form notes
        #[arg(long)]
        details: Option<String>,
    },
    /// Add a task to a day
    AddTask {
        text: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
        #[arg(long, short = 'r', default_value = "none")]
        repeat: RepeatPolicy,
    },
    /// Flip an event between done and not done
    Toggle {
        id: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Flip a task between done and not done
    ToggleTask {
        id: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Delete an event
    Delete {
        id: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Delete a task
    DeleteTask {
        id: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Replace a task's text
    EditTask {
        id: String,
        text: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
    },
    /// Edit an event
    Edit {
        id: String,
        #[arg(long, short = 'd')]
        date: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<ClockTime>,
        #[arg(long)]
        end: Option<ClockTime>,
        /// New notes; an empty string clears them
        #[arg(long)]
        details: Option<String>,
        /// Apply to every occurrence in the event's series
        #[arg(long)]
        all: bool,
    },
    /// Move an event to another day and time, keeping its length
    Move {
        id: String,
        /// Day the event is on now
        #[arg(long, short = 'd')]
        date: Option<String>,
        /// Destination day (defaults to the current day)
        #[arg(long)]
        to: Option<String>,
        /// New start time, snapped to the quarter hour
        #[arg(long)]
        at: ClockTime,
    },
    /// Show the column layout computed for a day
    Layout {
        #[arg(long, short = 'd')]
        date: Option<String>,
        /// Only events starting in this hour
        #[arg(long)]
        hour: Option<u8>,
    },
    /// Change the color used for a category
    Color {
        category: Category,
        color: Swatch,
    },
    /// Delete every event and task
    Clear {
        /// Required to confirm
        #[arg(long)]
        yes: bool,
    },
    /// Import upcoming events from Google Calendar (read-only)
    Import {
        /// OAuth access token with calendar.readonly scope
        #[arg(long, env = "WEEKGRID_GOOGLE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Launch the interactive week grid
    Tui,
}
