//! File-based subscription storage implementation.
//!
//! Stores subscriptions as individual YAML files at `{dir}/{id}.yaml`.
//! Each transaction holds a per-row lock and stages its write in memory until
//! commit. Only [`create`](SubscriptionStore::create) takes the store-wide
//! lock, for the length of its uniqueness check and write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::store::error::{StorageError, StorageResult};
use crate::store::subscription::{SubscriptionStore, Transaction};
use crate::subscription::Subscription;
use crate::sync::KeyedLocks;

/// File-based implementation of `SubscriptionStore`.
#[derive(Clone)]
pub struct FileSubscriptionStore {
    dir: PathBuf,
    rows: KeyedLocks,
    create: Arc<Mutex<()>>,
}

impl FileSubscriptionStore {
    /// Create a new file subscription store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rows: KeyedLocks::new(),
            create: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn begin(&self, id: &str) -> StorageResult<Box<dyn Transaction>> {
        let guard = self.rows.acquire(id).await;
        Ok(Box::new(FileTransaction {
            id: id.to_string(),
            dir: self.dir.clone(),
            rows: self.rows.clone(),
            staged: None,
            _guard: guard,
        }))
    }

    async fn create(&self, subscription: &Subscription) -> StorageResult<Option<Subscription>> {
        let _create = self.create.lock().await;

        let existing = read_all(&self.dir).await?.into_iter().find(|s| {
            s.handle.eq_ignore_ascii_case(&subscription.handle)
                && s.channel_id == subscription.channel_id
        });
        if existing.is_some() {
            return Ok(existing);
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::file_io(&self.dir, e))?;
        write_one(&self.dir, subscription).await?;
        debug!(subscription_id = %subscription.id, "Created subscription");
        Ok(None)
    }

    async fn list(&self, channel_id: Option<&str>) -> StorageResult<Vec<Subscription>> {
        let mut subscriptions = read_all(&self.dir).await?;
        if let Some(channel_id) = channel_id {
            subscriptions.retain(|s| s.channel_id == channel_id);
        }
        subscriptions.sort_by_key(|s| s.created_at);
        Ok(subscriptions)
    }
}

// ============================================================================
// Transaction
// ============================================================================

enum Staged {
    Put(Subscription),
    Delete,
}

struct FileTransaction {
    id: String,
    dir: PathBuf,
    rows: KeyedLocks,
    staged: Option<Staged>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl Transaction for FileTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self) -> StorageResult<Option<Subscription>> {
        match &self.staged {
            Some(Staged::Put(subscription)) => Ok(Some(subscription.clone())),
            Some(Staged::Delete) => Ok(None),
            None => read_one(&subscription_path(&self.dir, &self.id)).await,
        }
    }

    async fn put(&mut self, subscription: Subscription) -> StorageResult<()> {
        if subscription.id != self.id {
            return Err(StorageError::RowMismatch {
                expected: self.id.clone(),
                actual: subscription.id,
            });
        }
        self.staged = Some(Staged::Put(subscription));
        Ok(())
    }

    async fn delete(&mut self) -> StorageResult<()> {
        self.staged = Some(Staged::Delete);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        match &self.staged {
            None => return Ok(()),
            Some(Staged::Put(subscription)) => {
                fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| StorageError::file_io(&self.dir, e))?;
                write_one(&self.dir, subscription).await?;
            }
            Some(Staged::Delete) => {
                remove_one(&self.dir, &self.id).await?;
                self.rows.remove(&self.id);
            }
        }

        debug!(subscription_id = %self.id, "Committed subscription transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        if self.staged.is_some() {
            debug!(subscription_id = %self.id, "Rolled back subscription transaction");
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

fn subscription_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.yaml", id))
}

async fn read_one(path: &Path) -> StorageResult<Option<Subscription>> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::file_io(path, e)),
    };

    let subscription: Subscription = serde_saphyr::from_str(&content)
        .map_err(|e| StorageError::file_deserialization(path, e.to_string()))?;

    Ok(Some(subscription))
}

async fn read_all(dir: &Path) -> StorageResult<Vec<Subscription>> {
    let mut subscriptions = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::file_io(dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::file_io(dir, e))?
    {
        let path = entry.path();

        // Skip directories and non-YAML files (including in-flight temp files)
        if path.is_dir() || path.extension().is_none_or(|ext| ext != "yaml") {
            continue;
        }

        match read_one(&path).await {
            Ok(Some(subscription)) => subscriptions.push(subscription),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable subscription");
            }
        }
    }

    Ok(subscriptions)
}

async fn write_one(dir: &Path, subscription: &Subscription) -> StorageResult<()> {
    let path = subscription_path(dir, &subscription.id);
    let temp_path = path.with_extension("yaml.tmp");

    let content = serde_saphyr::to_string(subscription)
        .map_err(|e| StorageError::serialization(&subscription.id, e.to_string()))?;

    fs::write(&temp_path, content)
        .await
        .map_err(|e| StorageError::file_io(&temp_path, e))?;

    fs::rename(&temp_path, &path)
        .await
        .map_err(|e| StorageError::file_io(&path, e))
}

async fn remove_one(dir: &Path, id: &str) -> StorageResult<()> {
    let path = subscription_path(dir, id);

    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::file_io(&path, e)),
    }
}
