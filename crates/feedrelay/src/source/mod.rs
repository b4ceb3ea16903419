//! Paginated timeline sources.
//!
//! A source resolves an account handle and hands out its timeline one page at a
//! time. Pages are cursor-linked: page N+1 can only be requested with the
//! continuation returned alongside page N.

mod http;

pub use http::HttpSource;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::feed::{FeedItem, FeedKind};

/// A resolved upstream account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    /// Upstream account id.
    pub id: String,
    /// Handle without the leading `@`.
    pub handle: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One page of timeline items.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<FeedItem>,
    /// Continuation for the following page; `None` once the timeline is exhausted.
    pub next_cursor: Option<String>,
}

/// Errors returned by a timeline source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The handle does not resolve to an account.
    #[error("account not found: @{0}")]
    AccountNotFound(String),

    /// The account exists but is suspended or protected.
    #[error("account unavailable: @{0}")]
    AccountUnavailable(String),

    /// Upstream rejected the request due to rate limiting.
    #[error("rate limited by upstream")]
    RateLimited,

    /// Upstream is temporarily unavailable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Whether the account itself is gone, as opposed to a transient failure.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceError::AccountNotFound(_) | SourceError::AccountUnavailable(_)
        )
    }
}

/// Interface to an upstream timeline provider.
#[async_trait]
pub trait PaginatedSource: Send + Sync {
    /// Resolve a handle to an account.
    async fn resolve(&self, handle: &str) -> Result<Account, SourceError>;

    /// Fetch the newest page of the account's `feed` timeline.
    ///
    /// `size_hint` is the number of items requested; sources may return fewer or more.
    async fn first_page(
        &self,
        account: &Account,
        feed: FeedKind,
        size_hint: usize,
    ) -> Result<Page, SourceError>;

    /// Fetch the page following `cursor`.
    async fn next_page(
        &self,
        account: &Account,
        feed: FeedKind,
        cursor: &str,
        size_hint: usize,
    ) -> Result<Page, SourceError>;
}
