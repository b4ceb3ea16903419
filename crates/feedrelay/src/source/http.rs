//! JSON-over-HTTP timeline source.
//!
//! Talks to a timeline bridge exposing:
//! - `GET {base}/users/{handle}` returning an [`Account`]
//! - `GET {base}/users/{account_id}/{feed}?count=N[&cursor=C]` returning
//!   `{"items": [...], "next_cursor": "..."}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;
use crate::feed::{FeedItem, FeedKind};

use super::{Account, Page, PaginatedSource, SourceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeline source backed by an HTTP bridge.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    cookies: Option<String>,
}

/// What a request fetches. Only account lookups can report the account gone;
/// a missing timeline page is treated as a transient upstream failure.
#[derive(Debug, Clone, Copy)]
enum Request<'a> {
    Account(&'a str),
    Timeline,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    items: Vec<FeedItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl HttpSource {
    /// Create a source for the given bridge URL.
    pub fn new(base_url: Url) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: None,
            cookies: None,
        })
    }

    /// Create a source from configuration.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SourceError::Decode(format!("invalid base url: {e}")))?;
        let mut source = Self::new(base_url)?;
        source.token = config.token.clone().filter(|t| !t.is_empty());
        source.cookies = config
            .cookies
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(cookie_header);
        Ok(source)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Decode(format!("cannot use {} as base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        kind: Request<'_>,
    ) -> Result<T, SourceError> {
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(cookies) = &self.cookies {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()));
        }

        match (status, kind) {
            (StatusCode::NOT_FOUND, Request::Account(handle)) => {
                Err(SourceError::AccountNotFound(handle.to_string()))
            }
            (StatusCode::FORBIDDEN | StatusCode::GONE, Request::Account(handle)) => {
                Err(SourceError::AccountUnavailable(handle.to_string()))
            }
            (StatusCode::TOO_MANY_REQUESTS, _) => Err(SourceError::RateLimited),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::Unavailable(format!("{status}: {body}")))
            }
        }
    }

    async fn fetch_page(
        &self,
        account: &Account,
        feed: FeedKind,
        cursor: Option<&str>,
        size_hint: usize,
    ) -> Result<Page, SourceError> {
        let mut url = self.endpoint(&["users", account.id.as_str(), feed.as_str()])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &size_hint.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }

        let response: TimelineResponse = self.get_json(url, Request::Timeline).await?;
        debug!(
            handle = %account.handle,
            feed = %feed,
            items = response.items.len(),
            has_next = response.next_cursor.is_some(),
            "Fetched timeline page"
        );

        Ok(Page {
            items: response.items,
            next_cursor: response.next_cursor.filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl PaginatedSource for HttpSource {
    async fn resolve(&self, handle: &str) -> Result<Account, SourceError> {
        let url = self.endpoint(&["users", handle])?;
        self.get_json(url, Request::Account(handle)).await
    }

    async fn first_page(
        &self,
        account: &Account,
        feed: FeedKind,
        size_hint: usize,
    ) -> Result<Page, SourceError> {
        self.fetch_page(account, feed, None, size_hint).await
    }

    async fn next_page(
        &self,
        account: &Account,
        feed: FeedKind,
        cursor: &str,
        size_hint: usize,
    ) -> Result<Page, SourceError> {
        self.fetch_page(account, feed, Some(cursor), size_hint).await
    }
}

/// Build a `Cookie` header value.
///
/// Accepts either a JSON object of cookie names to values (as exported by
/// browser extensions) or a ready-made header string.
fn cookie_header(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
        Ok(map) => map
            .iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(s) => format!("{name}={s}"),
                other => format!("{name}={other}"),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Err(_) => raw.trim().to_string(),
    }
}
