//! Delivery of rendered batches to chat destinations.

mod discord;

pub use discord::DiscordNotifier;

use async_trait::async_trait;
use thiserror::Error;

use crate::render::Message;

/// A resolved delivery destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub channel_id: String,
    pub name: String,
    pub guild_id: Option<String>,
}

/// Errors returned by a notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid channel id: {0}")]
    InvalidChannel(String),

    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Interface to a chat service.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Look up a channel. `None` when it does not exist or is not reachable.
    async fn resolve(&self, channel_id: &str) -> Option<Destination>;

    /// Post a summary line and up to ten messages as a single send.
    async fn send(
        &self,
        destination: &Destination,
        summary: &str,
        messages: &[Message],
    ) -> Result<(), NotifyError>;
}
