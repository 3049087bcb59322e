mod classify;
mod cli;
mod commands;
mod config;
mod drag;
mod form;
mod import;
mod layout;
mod model;
mod recurrence;
mod schedule;
mod storage;
mod time;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    setup_logging();
    let args = cli::Cli::parse();
    let opts = args.global;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Week { date } => commands::week(&opts, date),
        cli::Command::AddEvent {
            title,
            date,
            start,
            end,
            repeat,
            details,
        } => commands::add_event(&opts, title, date, start, end, repeat, details),
        cli::Command::AddTask { text, date, repeat } => {
            commands::add_task(&opts, text, date, repeat)
        }
        cli::Command::Toggle { id, date } => commands::toggle(&opts, id, date),
        cli::Command::ToggleTask { id, date } => commands::toggle_task(&opts, id, date),
        cli::Command::Delete { id, date } => commands::delete(&opts, id, date),
        cli::Command::DeleteTask { id, date } => commands::delete_task(&opts, id, date),
        cli::Command::EditTask { id, text, date } => commands::edit_task(&opts, id, text, date),
        cli::Command::Edit {
            id,
            date,
            title,
            start,
            end,
            details,
            all,
        } => commands::edit(&opts, id, date, title, start, end, details, all),
        cli::Command::Move { id, date, to, at } => commands::move_event(&opts, id, date, to, at),
        cli::Command::Layout { date, hour } => commands::layout(&opts, date, hour),
        cli::Command::Color { category, color } => commands::color(&opts, category, color),
        cli::Command::Clear { yes } => commands::clear(&opts, yes),
        cli::Command::Import { token } => commands::import(&opts, token),
        cli::Command::Tui => commands::tui(&opts),
    }
}

fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("WEEKGRID_LOG", "warn"))
        .format_timestamp(None)
        .init();
}
