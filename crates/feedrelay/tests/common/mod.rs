//! Common test utilities.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

use feedrelay::cycle::CycleCoordinator;
use feedrelay::engine::{Checkpoint, SyncEngine};
use feedrelay::feed::{Author, FeedItem, FeedKind};
use feedrelay::notify::{Destination, Notifier, NotifyError};
use feedrelay::render::Message;
use feedrelay::scheduler::{Cadence, Scheduler};
use feedrelay::source::{Account, Page, PaginatedSource, SourceError};
use feedrelay::store::SubscriptionStore;
use feedrelay::store::file::FileSubscriptionStore;
use feedrelay::subscription::{SubscribeRequest, Subscription};

/// Channel known to [`RecordingNotifier`] by default.
pub const CHANNEL: &str = "1000";

// ============================================================================
// Items
// ============================================================================

/// Creation time of item `n`: `n` minutes after a fixed origin.
pub fn at(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 29, 0, 0, 0).unwrap() + chrono::Duration::minutes(n as i64)
}

/// A plain post by `alice` with id `n` created at [`at(n)`](at).
pub fn item(n: u32) -> FeedItem {
    FeedItem {
        id: n.to_string(),
        created_at: at(n),
        author: Author {
            name: "Alice".to_string(),
            handle: "alice".to_string(),
            avatar_url: Some("https://pbs.example/alice_normal.jpg".to_string()),
        },
        in_reply_to: None,
        reposted: None,
        quoted: None,
        text: format!("post {n}"),
        media: Vec::new(),
    }
}

pub fn reply(n: u32) -> FeedItem {
    FeedItem {
        in_reply_to: Some("1".to_string()),
        ..item(n)
    }
}

pub fn repost(n: u32) -> FeedItem {
    let mut original = item(1);
    original.author.handle = "bob".to_string();
    FeedItem {
        reposted: Some(Box::new(original)),
        ..item(n)
    }
}

/// Items `newest..=oldest`, newest first.
pub fn items(newest: u32, oldest: u32) -> Vec<FeedItem> {
    (oldest..=newest).rev().map(item).collect()
}

// ============================================================================
// ScriptedSource
// ============================================================================

/// Failure injected into every [`ScriptedSource`] request.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    RateLimited,
    Suspended,
}

/// In-memory timeline source paging over fixed item lists.
#[derive(Default)]
pub struct ScriptedSource {
    timelines: Mutex<HashMap<String, Vec<FeedItem>>>,
    failure: Mutex<Option<Failure>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    parked: Notify,
    requests: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `handle` with a timeline given newest first.
    pub fn set_timeline(&self, handle: &str, items: Vec<FeedItem>) {
        self.timelines
            .lock()
            .unwrap()
            .insert(handle.to_lowercase(), items);
    }

    pub fn remove_account(&self, handle: &str) {
        self.timelines.lock().unwrap().remove(&handle.to_lowercase());
    }

    pub fn fail_with(&self, failure: Option<Failure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Make first-page fetches for `handle` wait for a permit on the returned gate.
    pub fn gate(&self, handle: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(handle.to_lowercase(), gate.clone());
        gate
    }

    /// Wait until a fetch is parked on a gate.
    pub async fn parked(&self) {
        self.parked.notified().await;
    }

    /// Number of page requests served.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn check_failure(&self, handle: &str) -> Result<(), SourceError> {
        match *self.failure.lock().unwrap() {
            Some(Failure::RateLimited) => Err(SourceError::RateLimited),
            Some(Failure::Suspended) => Err(SourceError::AccountUnavailable(handle.to_string())),
            None => Ok(()),
        }
    }

    fn page(&self, account: &Account, offset: usize, size_hint: usize) -> Page {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let timelines = self.timelines.lock().unwrap();
        let timeline = timelines.get(&account.id).cloned().unwrap_or_default();

        let start = offset.min(timeline.len());
        let end = (offset + size_hint).min(timeline.len());
        Page {
            items: timeline[start..end].to_vec(),
            next_cursor: (end < timeline.len()).then(|| end.to_string()),
        }
    }
}

#[async_trait]
impl PaginatedSource for ScriptedSource {
    async fn resolve(&self, handle: &str) -> Result<Account, SourceError> {
        self.check_failure(handle)?;
        let key = handle.to_lowercase();
        if !self.timelines.lock().unwrap().contains_key(&key) {
            return Err(SourceError::AccountNotFound(handle.to_string()));
        }
        Ok(Account {
            id: key,
            handle: handle.to_string(),
            name: None,
        })
    }

    async fn first_page(
        &self,
        account: &Account,
        _feed: FeedKind,
        size_hint: usize,
    ) -> Result<Page, SourceError> {
        self.check_failure(&account.handle)?;
        let gate = self.gates.lock().unwrap().get(&account.id).cloned();
        if let Some(gate) = gate {
            self.parked.notify_one();
            let _permit = gate.acquire().await.unwrap();
        }
        Ok(self.page(account, 0, size_hint))
    }

    async fn next_page(
        &self,
        account: &Account,
        _feed: FeedKind,
        cursor: &str,
        size_hint: usize,
    ) -> Result<Page, SourceError> {
        self.check_failure(&account.handle)?;
        let offset = cursor
            .parse()
            .map_err(|_| SourceError::Decode(format!("bad cursor {cursor}")))?;
        Ok(self.page(account, offset, size_hint))
    }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

/// One recorded send.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel_id: String,
    pub summary: String,
    pub messages: Vec<Message>,
}

/// Notifier that records sends and can be told to fail.
pub struct RecordingNotifier {
    channels: Mutex<HashSet<String>>,
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// A notifier that knows [`CHANNEL`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashSet::from([CHANNEL.to_string()])),
            deliveries: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.channels.lock().unwrap().remove(channel_id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn resolve(&self, channel_id: &str) -> Option<Destination> {
        self.channels
            .lock()
            .unwrap()
            .contains(channel_id)
            .then(|| Destination {
                channel_id: channel_id.to_string(),
                name: "feeds".to_string(),
                guild_id: Some("1".to_string()),
            })
    }

    async fn send(
        &self,
        destination: &Destination,
        summary: &str,
        messages: &[Message],
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("connection reset".to_string()));
        }
        self.deliveries.lock().unwrap().push(Delivery {
            channel_id: destination.channel_id.clone(),
            summary: summary.to_string(),
            messages: messages.to_vec(),
        });
        Ok(())
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// File store, scripted source and recording notifier wired to a coordinator.
pub struct Fixture {
    pub store: Arc<FileSubscriptionStore>,
    pub source: Arc<ScriptedSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: SyncEngine,
    pub coordinator: Arc<CycleCoordinator>,
    _tmp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileSubscriptionStore::new(tmp.path().join("subscriptions")));
        let source = ScriptedSource::new();
        let notifier = RecordingNotifier::new();
        let engine = SyncEngine::new(source.clone(), Duration::ZERO);
        let coordinator = Arc::new(CycleCoordinator::new(
            store.clone(),
            engine.clone(),
            notifier.clone(),
            chrono_tz::UTC,
        ));

        Self {
            store,
            source,
            notifier,
            engine,
            coordinator,
            _tmp: tmp,
        }
    }

    /// Persist a subscription for `alice` in [`CHANNEL`] with the given checkpoint.
    pub async fn subscribe_at(
        &self,
        checkpoint: Option<u32>,
        configure: impl FnOnce(&mut Subscription),
    ) -> Subscription {
        let mut subscription = Subscription::new(SubscribeRequest::new("alice", CHANNEL));
        if let Some(n) = checkpoint {
            subscription.advance(&Checkpoint::of(&item(n)));
        }
        configure(&mut subscription);

        let mut tx = self.store.begin(&subscription.id).await.unwrap();
        tx.put(subscription.clone()).await.unwrap();
        tx.commit().await.unwrap();
        subscription
    }

    /// Scheduler running cycles through this fixture's coordinator.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Cadence::every_minutes(59).unwrap(),
            self.coordinator.clone(),
        )
    }

    pub async fn load(&self, id: &str) -> Option<Subscription> {
        let tx = self.store.begin(id).await.unwrap();
        tx.get().await.unwrap()
    }
}
