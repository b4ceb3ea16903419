//! Wall-clock aligned polling cadence.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::{Result, SchedulerError};

/// Fires every N minutes on minute boundaries divisible by N.
#[derive(Debug, Clone)]
pub struct Cadence {
    minutes: u32,
    schedule: cron::Schedule,
}

impl Cadence {
    /// Create a cadence of `minutes` in `1..=59`.
    pub fn every_minutes(minutes: u32) -> Result<Self> {
        if !(1..=59).contains(&minutes) {
            return Err(SchedulerError::InvalidCadence(format!(
                "interval must be between 1 and 59 minutes, got {minutes}"
            )));
        }

        // cron crate format: sec min hour day-of-month month day-of-week
        let expr = format!("0 */{minutes} * * * *");
        let schedule = cron::Schedule::from_str(&expr)
            .map_err(|e| SchedulerError::InvalidCadence(format!("{expr}: {e}")))?;

        Ok(Self { minutes, schedule })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// First boundary strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }

    /// Time to wait from `now` until `at`, zero if already passed.
    pub fn delay_until(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
        (at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
