//! Incremental timeline synchronization.
//!
//! Turns whatever a [`PaginatedSource`] returns into the strictly-new items
//! since a subscription's checkpoint, and computes the next checkpoint.
//!
//! # Algorithm
//!
//! 1. Fetch the first page (one item when seeding, a full page otherwise).
//! 2. Without a checkpoint, the first page is returned as a seed.
//! 3. Otherwise keep fetching pages, pausing between requests, until a page
//!    contains the checkpoint item, an item at or before the checkpoint time,
//!    or nothing at all.
//! 4. Merge and sort newest first, then trim at the checkpoint.
//! 5. The next checkpoint is the newest fetched item, independent of trimming.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::feed::{FeedItem, FeedKind};
use crate::source::{PaginatedSource, SourceError};

/// Page size requested when seeding a new subscription.
pub const SEED_PAGE_SIZE: usize = 1;

/// Page size requested for incremental fetches.
pub const PAGE_SIZE: usize = 40;

/// Boundary between already-considered and not-yet-considered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn of(item: &FeedItem) -> Self {
        Self {
            id: item.id.clone(),
            at: item.created_at,
        }
    }
}

/// Result of one synchronization.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// New items, newest first.
    pub items: Vec<FeedItem>,
    /// Checkpoint to store; `None` leaves the stored checkpoint unchanged.
    pub next_cursor: Option<Checkpoint>,
    /// True when no checkpoint existed and `items` is a seed, not new activity.
    pub seeded: bool,
    /// Number of pages requested.
    pub pages: usize,
}

/// Drives a [`PaginatedSource`] to compute new items since a checkpoint.
#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn PaginatedSource>,
    page_delay: Duration,
}

impl SyncEngine {
    /// Create an engine that waits `page_delay` between successive page fetches.
    pub fn new(source: Arc<dyn PaginatedSource>, page_delay: Duration) -> Self {
        Self { source, page_delay }
    }

    /// Fetch items newer than `(cursor_id, cursor_time)` from `handle`'s `feed`.
    ///
    /// Account resolution failures are returned as-is; callers decide whether
    /// they are terminal via [`SourceError::is_terminal`].
    pub async fn synchronize(
        &self,
        handle: &str,
        feed: FeedKind,
        cursor_id: Option<&str>,
        cursor_time: Option<DateTime<Utc>>,
    ) -> Result<SyncResult, SourceError> {
        let seeding = cursor_id.is_none() && cursor_time.is_none();
        info!(
            handle = %handle,
            feed = %feed,
            cursor_id = cursor_id.unwrap_or("-"),
            "Fetching timeline"
        );

        let account = self.source.resolve(handle).await?;
        let size_hint = if seeding { SEED_PAGE_SIZE } else { PAGE_SIZE };
        let mut page = self.source.first_page(&account, feed, size_hint).await?;
        let mut pages = 1;

        if seeding {
            let mut items = page.items;
            sort_newest_first(&mut items);
            let next = items.first().map(Checkpoint::of);
            debug!(handle = %handle, items = items.len(), "Seeded timeline");
            return Ok(SyncResult {
                items,
                next_cursor: next,
                seeded: true,
                pages,
            });
        }

        let mut fetched: Vec<FeedItem> = Vec::new();
        loop {
            let reached = page
                .items
                .iter()
                .any(|item| at_or_before(item, cursor_id, cursor_time));
            let exhausted = page.items.is_empty();
            fetched.extend(page.items);

            if reached || exhausted {
                break;
            }
            let Some(cursor) = page.next_cursor else {
                break;
            };

            tokio::time::sleep(self.page_delay).await;
            pages += 1;
            debug!(handle = %handle, page = pages, "Fetching next page");
            page = self
                .source
                .next_page(&account, feed, &cursor, PAGE_SIZE)
                .await?;
        }

        sort_newest_first(&mut fetched);

        // The newest fetched item becomes the checkpoint even when nothing is new,
        // but never one older than the stored checkpoint.
        let next = fetched
            .first()
            .filter(|newest| cursor_time.is_none_or(|t| newest.created_at >= t))
            .map(Checkpoint::of);

        let total = fetched.len();
        let items = trim(fetched, cursor_id, cursor_time);
        info!(
            handle = %handle,
            pages,
            fetched = total,
            new = items.len(),
            "Timeline synchronized"
        );

        Ok(SyncResult {
            items,
            next_cursor: next,
            seeded: false,
            pages,
        })
    }
}

/// Whether `item` is the checkpoint item or no newer than the checkpoint time.
fn at_or_before(
    item: &FeedItem,
    cursor_id: Option<&str>,
    cursor_time: Option<DateTime<Utc>>,
) -> bool {
    cursor_id.is_some_and(|id| item.id == id)
        || cursor_time.is_some_and(|t| item.created_at <= t)
}

/// Stable sort by creation time, newest first.
fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Keep the prefix of `items` (sorted newest first) strictly after the checkpoint.
///
/// Without a cut point the whole sequence is returned.
fn trim(
    mut items: Vec<FeedItem>,
    cursor_id: Option<&str>,
    cursor_time: Option<DateTime<Utc>>,
) -> Vec<FeedItem> {
    let cut = items
        .iter()
        .position(|item| at_or_before(item, cursor_id, cursor_time))
        .unwrap_or(items.len());
    items.truncate(cut);
    items
}
