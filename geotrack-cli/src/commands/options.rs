//! Options command - print the fallback schedule per retry attempt.

use std::path::Path;
use std::time::Duration;

use geotrack::watch::{backoff_delay, WatchOptions};

use super::common::load_config;
use crate::error::CliError;

/// One row of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRow {
    pub attempt: u8,
    pub options: WatchOptions,
    /// Backoff before this attempt's subscription is opened.
    pub backoff: Option<Duration>,
}

/// Schedule for attempts `0..=max_attempts`.
pub fn schedule(max_attempts: u8) -> Vec<ScheduleRow> {
    (0..=max_attempts)
        .map(|attempt| ScheduleRow {
            attempt,
            options: WatchOptions::for_attempt(attempt),
            backoff: (attempt > 0).then(|| backoff_delay(attempt)),
        })
        .collect()
}

/// Run the options command.
pub fn run(config_path: &Path, max_attempts: Option<u8>) -> Result<(), CliError> {
    let config = load_config(config_path)?.tracker;
    let max_attempts = max_attempts.unwrap_or(config.max_attempts);
    let initial = config.initial_fix;

    println!("Initial fix");
    println!("===========");
    println!(
        "  high accuracy: {}  timeout: {} ms  max age: {} ms",
        initial.high_accuracy, initial.timeout_ms, initial.max_fix_age_ms
    );
    println!();

    println!("Watch schedule ({} retries)", max_attempts);
    println!("=========================");
    println!(
        "  {:>7}  {:>13}  {:>10}  {:>10}  {:>8}",
        "attempt", "high accuracy", "timeout", "max age", "backoff"
    );
    for row in schedule(max_attempts) {
        let backoff = row
            .backoff
            .map(|delay| format!("{} ms", delay.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>7}  {:>13}  {:>7} ms  {:>7} ms  {:>8}",
            row.attempt,
            row.options.high_accuracy,
            row.options.timeout_ms,
            row.options.max_fix_age_ms,
            backoff
        );
    }
    println!();
    println!(
        "After {} consecutive timeouts tracking stops as unavailable.",
        u16::from(max_attempts) + 1
    );

    Ok(())
}
