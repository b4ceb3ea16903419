//! Subscription storage traits.

use async_trait::async_trait;

use crate::subscription::Subscription;

use super::error::StorageResult;

/// Storage interface for subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Open a transaction over the row `id`.
    ///
    /// Waits only for other open transactions on the same row.
    async fn begin(&self, id: &str) -> StorageResult<Box<dyn Transaction>>;

    /// Insert a new subscription unless `(handle, channel_id)` is taken.
    ///
    /// Handles compare case-insensitively. Returns the existing subscription
    /// on conflict, in which case nothing is written.
    async fn create(&self, subscription: &Subscription) -> StorageResult<Option<Subscription>>;

    /// List committed subscriptions, oldest first, optionally for one channel.
    async fn list(&self, channel_id: Option<&str>) -> StorageResult<Vec<Subscription>>;
}

/// A unit of work over one subscription row.
///
/// Writes are staged and become visible to other transactions on
/// [`commit`](Transaction::commit). Dropping a transaction without committing
/// discards its writes.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Id of the row this transaction holds.
    fn id(&self) -> &str;

    /// Load the row, including a write staged in this transaction.
    async fn get(&self) -> StorageResult<Option<Subscription>>;

    /// Create or update the row. `subscription.id` must be this row's id.
    async fn put(&mut self, subscription: Subscription) -> StorageResult<()>;

    /// Delete the row. No-op if it doesn't exist.
    async fn delete(&mut self) -> StorageResult<()>;

    /// Apply the staged write and release the row.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard the staged write and release the row.
    async fn rollback(self: Box<Self>);
}
