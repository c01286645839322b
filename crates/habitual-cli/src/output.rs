//! Plain-text rendering for terminal output.

use std::{collections::BTreeMap, fmt::Write as _};

use chrono::{Datelike as _, NaiveDate};
use habitual_core::{
  habit::Habit,
  habit_set::Progress,
  history::{CompletionBand, CompletionHistory, HistoryRange, by_day},
  rollover::RolloverOutcome,
};

/// One-line summary of what activation did, or `None` when nothing notable
/// happened.
pub fn outcome_line(outcome: &RolloverOutcome) -> Option<String> {
  match outcome {
    RolloverOutcome::FirstRun { today } => Some(format!("Welcome! Tracking starts {today}.")),
    RolloverOutcome::SameDay { .. } => None,
    RolloverOutcome::ClockBehind { today, last_opened } => Some(format!(
      "warning: clock reads {today}, earlier than last use on {last_opened}; nothing was reset"
    )),
    RolloverOutcome::RolledOver(report) => {
      let backfilled = report.written.iter().filter(|d| **d != report.stale_day).count();
      let mut line = format!(
        "New day. {} closed at {:.0}%",
        report.stale_day,
        report.stale_percentage * 100.0
      );
      if backfilled > 0 {
        let _ = write!(line, ", {backfilled} missed day(s) recorded as 0%");
      }
      line.push('.');
      Some(line)
    }
  }
}

pub fn habit_list(habits: &[Habit], progress: Progress) -> String {
  if habits.is_empty() {
    return "No habits yet. Add one with `habitual add <title>`.\n".to_string();
  }
  let mut out = String::new();
  for (i, habit) in habits.iter().enumerate() {
    let mark = if habit.is_completed { 'x' } else { ' ' };
    let _ = writeln!(out, "{:>3}. [{mark}] {}", i + 1, habit.title);
  }
  let _ = writeln!(
    out,
    "\n{}/{} done ({:.0}%)",
    progress.completed,
    progress.total,
    progress.percentage * 100.0
  );
  out
}

fn band_glyph(band: CompletionBand) -> char {
  match band {
    CompletionBand::Empty => '·',
    CompletionBand::Low => '░',
    CompletionBand::Medium => '▒',
    CompletionBand::High => '█',
  }
}

/// A Monday-first month grid. Each day shows its number and the band of its
/// recorded completion; days without a record are left unshaded.
pub fn month_calendar(month: NaiveDate, rows: &[CompletionHistory]) -> String {
  let range = HistoryRange::month_of(month);
  let days: BTreeMap<NaiveDate, f64> = by_day(rows);

  let mut out = String::new();
  let _ = writeln!(out, "{}", range.start.format("%B %Y"));
  out.push_str(" Mo  Tu  We  Th  Fr  Sa  Su\n");

  let lead = range.start.weekday().num_days_from_monday() as usize;
  out.push_str(&"    ".repeat(lead));

  let mut column = lead;
  for day in range.start.iter_days().take_while(|d| *d < range.end) {
    let shade = days
      .get(&day)
      .map(|p| band_glyph(CompletionBand::from_percentage(*p)))
      .unwrap_or(' ');
    let _ = write!(out, "{:>2}{shade} ", day.day());
    column += 1;
    if column == 7 {
      out.truncate(out.trim_end_matches(' ').len());
      out.push('\n');
      column = 0;
    }
  }
  if column != 0 {
    out.truncate(out.trim_end_matches(' ').len());
    out.push('\n');
  }

  let recorded = days.keys().filter(|d| range.contains(**d)).count();
  let _ = writeln!(out, "\n{recorded} day(s) recorded   · 0%  ░ <50%  ▒ <80%  █ 80%+");
  out
}
