//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No job is registered for the subscription.
    #[error("subscription not scheduled: {0}")]
    NotScheduled(String),

    /// Polling cadence is out of range or unparsable.
    #[error("invalid cadence: {0}")]
    InvalidCadence(String),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
