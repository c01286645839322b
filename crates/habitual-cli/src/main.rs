//! `habitual`: command-line client for the Habitual habit tracker.
//!
//! Every command first activates the tracker, so a pending day rollover is
//! always applied before anything is read or changed.
//!
//! # Usage
//!
//! ```text
//! habitual --url http://localhost:8080 --user alice --password secret status
//! habitual --config ~/.config/habitual/config.toml done 2
//! habitual history --month 2024-03
//! ```

mod client;
mod output;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use habitual_core::{config::TrackerConfig, day::SystemClock, habit::Habit, tracker::Tracker};
use habitual_store_sqlite::SqliteSettings;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type AppTracker = Tracker<ApiClient, ApiClient, SqliteSettings, SystemClock>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "habitual", about = "Track daily habits from the terminal")]
struct Args {
  /// Path to a TOML config file (url, username, password, state_path).
  #[arg(short, long, value_name = "FILE", env = "HABITUAL_CONFIG")]
  config: Option<PathBuf>,

  /// Base URL of the habitual server (default: http://localhost:8080).
  #[arg(long, env = "HABITUAL_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "HABITUAL_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "HABITUAL_PASSWORD")]
  password: Option<String>,

  /// Local state database holding the last-opened day.
  #[arg(long, value_name = "FILE", env = "HABITUAL_STATE")]
  state: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
  /// Show today's habits and progress (the default).
  Status,
  /// Add a new habit.
  Add { title: Vec<String> },
  /// Mark habit number N as done.
  Done { n: usize },
  /// Mark habit number N as not done.
  Undo { n: usize },
  /// Flip habit number N.
  Toggle { n: usize },
  /// Rename habit number N.
  Rename { n: usize, title: Vec<String> },
  /// Delete habit number N.
  Rm { n: usize },
  /// Show the completion calendar for a month.
  History {
    /// Month as YYYY-MM (default: the current month).
    #[arg(long, value_parser = parse_month)]
    month: Option<NaiveDate>,
  },
  /// Show the signed-in owner id.
  Whoami,
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:        String,
  #[serde(default)]
  username:   String,
  #[serde(default)]
  password:   String,
  #[serde(default)]
  state_path: Option<PathBuf>,
  #[serde(default)]
  tracker:    TrackerConfig,
}

fn parse_month(s: &str) -> Result<NaiveDate, String> {
  NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
    .map_err(|_| format!("expected YYYY-MM, got {s:?}"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };
  let state_path = expand_tilde(
    &args
      .state
      .or(file_cfg.state_path)
      .unwrap_or_else(|| PathBuf::from("~/.local/state/habitual/state.db")),
  );

  if let Some(parent) = state_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating state directory {}", parent.display()))?;
  }
  let settings = SqliteSettings::open(&state_path)
    .await
    .with_context(|| format!("opening state database {}", state_path.display()))?;

  let client = Arc::new(ApiClient::new(api_config, file_cfg.tracker.session_refresh_margin())?);
  let tracker: AppTracker = Tracker::new(
    client.clone(),
    client,
    Arc::new(settings),
    Arc::new(SystemClock),
    &file_cfg.tracker,
  );

  run(&tracker, args.command.unwrap_or(Command::Status)).await
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn run(tracker: &AppTracker, command: Command) -> Result<()> {
  let outcome = tracker.activate().await.context("could not start the day")?;
  if let Some(line) = output::outcome_line(&outcome) {
    eprintln!("{line}");
  }

  match command {
    Command::Status => {}
    Command::Add { title } => {
      let habit = tracker.create_habit(&title.join(" ")).await?;
      println!("Added \"{}\".", habit.title);
    }
    Command::Done { n } => {
      let habit = nth(tracker, n).await?;
      tracker.set_completed(habit.id, true).await?;
    }
    Command::Undo { n } => {
      let habit = nth(tracker, n).await?;
      tracker.set_completed(habit.id, false).await?;
    }
    Command::Toggle { n } => {
      let habit = nth(tracker, n).await?;
      tracker.toggle(habit.id).await?;
    }
    Command::Rename { n, title } => {
      let habit = nth(tracker, n).await?;
      tracker.rename_habit(habit.id, &title.join(" ")).await?;
    }
    Command::Rm { n } => {
      let habit = nth(tracker, n).await?;
      tracker.delete_habit(habit.id).await?;
      println!("Deleted \"{}\".", habit.title);
    }
    Command::History { month } => {
      let month = month.unwrap_or_else(|| tracker.today());
      let rows = tracker.month_history(month).await?;
      print!("{}", output::month_calendar(month, &rows));
      return Ok(());
    }
    Command::Whoami => {
      println!("{}", tracker.owner().await?);
      return Ok(());
    }
  }

  let habits = tracker.habits().await?;
  let progress = tracker.progress().await?;
  print!("{}", output::habit_list(&habits, progress));
  Ok(())
}

/// The habit shown as number `n` by `status` (1-based).
async fn nth(tracker: &AppTracker, n: usize) -> Result<Habit> {
  let habits = tracker.habits().await?;
  let count = habits.len();
  match n.checked_sub(1).and_then(|i| habits.into_iter().nth(i)) {
    Some(habit) => Ok(habit),
    None => bail!("no habit #{n} (there are {count})"),
  }
}
