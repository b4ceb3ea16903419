//! Filtering and formatting of new items into destination messages.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::feed::FeedItem;

/// Maximum number of embeds a destination accepts in one message.
pub const MAX_BATCH_SIZE: usize = 10;

/// Accent colour of rendered embeds.
pub const EMBED_COLOUR: u32 = 0x1DA0F2;

static AVATAR_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"normal(\.jpg)$").expect("hardcoded regex is valid"));

// ============================================================================
// Types
// ============================================================================

/// How an item is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Tweet,
    Retweet,
    Quote,
}

impl ItemKind {
    pub fn classify(item: &FeedItem) -> Self {
        if item.reposted.is_some() {
            ItemKind::Retweet
        } else if item.quoted.is_some() {
            ItemKind::Quote
        } else {
            ItemKind::Tweet
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Tweet => "Tweet",
            ItemKind::Retweet => "Retweet",
            ItemKind::Quote => "Quote",
        }
    }
}

/// Author block of a rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAuthor {
    pub name: String,
    pub url: String,
    pub icon_url: Option<String>,
}

/// One destination-ready message (a single embed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub description: String,
    pub url: String,
    pub colour: u32,
    pub timestamp: DateTime<Utc>,
    /// Creation time rendered in the display timezone.
    pub footer: String,
    pub author: MessageAuthor,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
}

/// Messages ready for delivery plus their summary line.
#[derive(Debug, Clone)]
pub struct Batch {
    pub summary: String,
    /// At most [`MAX_BATCH_SIZE`] messages, newest first.
    pub messages: Vec<Message>,
    /// Number of items that survived filtering, before the cap.
    pub total: usize,
}

// ============================================================================
// Filtering
// ============================================================================

/// Whether an item passes the subscription's inclusion filters.
pub fn should_deliver(item: &FeedItem, ignore_replies: bool, ignore_retweets: bool) -> bool {
    !((ignore_replies && item.is_reply()) || (ignore_retweets && item.is_repost()))
}

/// Drop items excluded by the subscription's filters, preserving order.
pub fn filter(items: Vec<FeedItem>, ignore_replies: bool, ignore_retweets: bool) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| should_deliver(item, ignore_replies, ignore_retweets))
        .collect()
}

// ============================================================================
// Formatting
// ============================================================================

/// Render a single item.
pub fn render_message(item: &FeedItem, timezone: Tz) -> Message {
    let kind = ItemKind::classify(item);
    let author = &item.author;

    let description = match &item.quoted {
        Some(quoted) => format!(
            "{}\n\nRT @{}: {}",
            item.text, quoted.author.handle, quoted.text
        ),
        None => item.text.clone(),
    };

    Message {
        title: format!("New {} from @{}", kind.label(), author.handle),
        description,
        url: item.permalink(),
        colour: EMBED_COLOUR,
        timestamp: item.created_at,
        footer: item
            .created_at
            .with_timezone(&timezone)
            .format("%Y-%m-%d %H:%M %Z")
            .to_string(),
        author: MessageAuthor {
            name: format!("{} (@{})", author.name, author.handle),
            url: author.profile_url(),
            icon_url: author.avatar_url.clone(),
        },
        thumbnail_url: author
            .avatar_url
            .as_deref()
            .map(|url| AVATAR_SIZE.replace(url, "400x400$1").into_owned()),
        image_url: item.media.first().map(|m| m.url.clone()),
    }
}

/// Summary line for a batch of `count` items from `handle`.
///
/// Returns `None` when there is nothing to announce.
pub fn summary(count: usize, handle: &str) -> Option<String> {
    match count {
        0 => None,
        1 => Some(format!("New Activity from @{handle}")),
        n if n <= MAX_BATCH_SIZE => Some(format!("{n} New Activities from @{handle}")),
        n => Some(format!(
            "{n} New Activities from @{handle}\n\
             Due to Discord's API limitations, embeds are displayed up to a maximum of {MAX_BATCH_SIZE}."
        )),
    }
}

/// Filter new items and render the survivors into a capped batch.
///
/// `items` must be newest first. Returns `None` when nothing survives filtering.
pub fn render(
    items: Vec<FeedItem>,
    ignore_replies: bool,
    ignore_retweets: bool,
    handle: &str,
    timezone: Tz,
) -> Option<Batch> {
    let items = filter(items, ignore_replies, ignore_retweets);
    let total = items.len();
    let summary = summary(total, handle)?;

    let messages = items
        .iter()
        .take(MAX_BATCH_SIZE)
        .map(|item| render_message(item, timezone))
        .collect();

    Some(Batch {
        summary,
        messages,
        total,
    })
}
