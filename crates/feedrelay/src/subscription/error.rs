//! Subscription error types.

use thiserror::Error;

use crate::scheduler::SchedulerError;
use crate::source::SourceError;
use crate::store::StorageError;

/// Errors returned by subscription management.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The handle does not resolve to an available account.
    #[error("account not found: @{0}")]
    AccountNotFound(String),

    /// Transient source failure while seeding.
    #[error("source error: {0}")]
    Source(SourceError),

    /// The account is already subscribed in the channel.
    #[error("@{handle} is already subscribed in channel {channel_id}")]
    Duplicate { handle: String, channel_id: String },

    #[error("subscription not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl From<SourceError> for SubscriptionError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::AccountNotFound(handle) | SourceError::AccountUnavailable(handle) => {
                SubscriptionError::AccountNotFound(handle)
            }
            other => SubscriptionError::Source(other),
        }
    }
}
