//! Timeline item types.
//!
//! Items are produced by a [`PaginatedSource`](crate::source::PaginatedSource),
//! consumed by the sync engine and the renderer, and never persisted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// FeedKind
// ============================================================================

/// Which timeline tab of an account is polled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    /// Original posts and reposts ("Tweets" tab).
    #[default]
    #[serde(rename = "Tweets")]
    Posts,
    /// All activity including replies ("Replies" tab).
    Replies,
    /// Posts carrying media ("Media" tab).
    Media,
}

impl FeedKind {
    /// Upstream tab name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Posts => "Tweets",
            FeedKind::Replies => "Replies",
            FeedKind::Media => "Media",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tweets" | "posts" => Ok(FeedKind::Posts),
            "replies" => Ok(FeedKind::Replies),
            "media" => Ok(FeedKind::Media),
            other => Err(format!("unknown feed kind: {other}")),
        }
    }
}

// ============================================================================
// FeedItem
// ============================================================================

/// Account that authored an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Handle without the leading `@`.
    pub handle: String,
    /// Profile image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn profile_url(&self) -> String {
        format!("https://x.com/{}", self.handle)
    }
}

/// Media attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
}

/// A single timestamped timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
    /// Id of the item this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Original item when this entry is a repost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reposted: Option<Box<FeedItem>>,
    /// Original item when this entry quotes another.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted: Option<Box<FeedItem>>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Media>,
}

impl FeedItem {
    pub fn is_reply(&self) -> bool {
        self.in_reply_to.is_some()
    }

    pub fn is_repost(&self) -> bool {
        self.reposted.is_some()
    }

    /// Public link to the item, or to the original when this is a repost.
    pub fn permalink(&self) -> String {
        let target = self.reposted.as_deref().unwrap_or(self);
        format!("https://x.com/{}/status/{}", target.author.handle, target.id)
    }
}
