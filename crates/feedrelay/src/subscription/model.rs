//! Subscription data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Checkpoint;
use crate::feed::FeedKind;

/// Unique identifier for a subscription.
pub type SubscriptionId = String;

/// A persisted binding of one account's timeline to one destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Account handle without the leading `@`.
    pub handle: String,
    #[serde(default)]
    pub feed: FeedKind,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub ignore_replies: bool,
    #[serde(default)]
    pub ignore_retweets: bool,
    /// Id of the newest item already considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_item_id: Option<String>,
    /// Creation time of the newest item already considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_item_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a subscription.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub handle: String,
    pub feed: FeedKind,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub ignore_replies: bool,
    pub ignore_retweets: bool,
}

impl SubscribeRequest {
    pub fn new(handle: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            feed: FeedKind::default(),
            channel_id: channel_id.into(),
            guild_id: None,
            ignore_replies: false,
            ignore_retweets: false,
        }
    }

    pub fn feed(mut self, feed: FeedKind) -> Self {
        self.feed = feed;
        self
    }

    pub fn guild_id(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn ignore_replies(mut self, ignore: bool) -> Self {
        self.ignore_replies = ignore;
        self
    }

    pub fn ignore_retweets(mut self, ignore: bool) -> Self {
        self.ignore_retweets = ignore;
        self
    }
}

impl Subscription {
    /// Generate a new subscription ID.
    pub fn generate_id() -> SubscriptionId {
        format!("sub_{}", ulid::Ulid::new())
    }

    /// Create an unseeded subscription from a request.
    pub fn new(request: SubscribeRequest) -> Self {
        let handle = request.handle.trim_start_matches('@').to_string();
        Self {
            id: Self::generate_id(),
            handle,
            feed: request.feed,
            channel_id: request.channel_id,
            guild_id: request.guild_id,
            ignore_replies: request.ignore_replies,
            ignore_retweets: request.ignore_retweets,
            last_item_id: None,
            last_item_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the subscription has never recorded a checkpoint.
    pub fn is_unseeded(&self) -> bool {
        self.last_item_id.is_none() && self.last_item_at.is_none()
    }

    /// Move the checkpoint to `checkpoint`.
    pub fn advance(&mut self, checkpoint: &Checkpoint) {
        self.last_item_id = Some(checkpoint.id.clone());
        self.last_item_at = Some(checkpoint.at);
    }

    pub fn profile_url(&self) -> String {
        format!("https://x.com/{}", self.handle)
    }
}
