//! One polling cycle for one subscription.
//!
//! A cycle runs inside a single transaction on its subscription's row, so
//! cycles of different subscriptions never wait on each other:
//!
//! ```text
//! begin ─► get row ─► resolve channel ─► synchronize ─► put checkpoint
//!                                                         │
//!                                   seed? ── yes ─► commit
//!                                     │ no
//!                                   render ─► send ─► commit
//! ```
//!
//! Any failure before commit leaves the stored checkpoint untouched, so the
//! same items are fetched again on the next tick.

use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::engine::SyncEngine;
use crate::notify::Notifier;
use crate::render;
use crate::scheduler::CycleRunner;
use crate::store::{StorageResult, SubscriptionStore};

/// What a cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First checkpoint recorded; nothing delivered.
    Seeded,
    /// Nothing new to deliver.
    Idle,
    /// `count` new items delivered (before the per-message cap).
    Delivered { count: usize },
    /// The subscription no longer exists.
    Orphaned,
    /// The destination channel could not be resolved.
    ChannelUnavailable,
    /// The account no longer resolves; the subscription was removed.
    AccountGone,
    /// Transient source failure.
    SourceFailed,
    /// The notifier rejected the batch.
    DeliveryFailed,
    /// The store failed.
    StoreFailed,
}

impl CycleOutcome {
    /// Whether the job for this subscription should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleOutcome::Orphaned | CycleOutcome::AccountGone)
    }
}

/// Runs cycles against a store, a sync engine and a notifier.
pub struct CycleCoordinator {
    store: Arc<dyn SubscriptionStore>,
    engine: SyncEngine,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
}

impl CycleCoordinator {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        engine: SyncEngine,
        notifier: Arc<dyn Notifier>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            engine,
            notifier,
            timezone,
        }
    }

    /// Run one cycle for subscription `id`.
    pub async fn run(&self, id: &str) -> CycleOutcome {
        match self.try_run(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(subscription_id = %id, error = %e, "Store failure during cycle");
                CycleOutcome::StoreFailed
            }
        }
    }

    async fn try_run(&self, id: &str) -> StorageResult<CycleOutcome> {
        let mut tx = self.store.begin(id).await?;

        let Some(mut subscription) = tx.get().await? else {
            info!(subscription_id = %id, "Subscription no longer exists");
            tx.rollback().await;
            return Ok(CycleOutcome::Orphaned);
        };

        let Some(destination) = self.notifier.resolve(&subscription.channel_id).await else {
            warn!(
                subscription_id = %id,
                channel_id = %subscription.channel_id,
                "Destination channel unavailable"
            );
            tx.rollback().await;
            return Ok(CycleOutcome::ChannelUnavailable);
        };

        let result = match self
            .engine
            .synchronize(
                &subscription.handle,
                subscription.feed,
                subscription.last_item_id.as_deref(),
                subscription.last_item_at,
            )
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_terminal() => {
                warn!(
                    subscription_id = %id,
                    handle = %subscription.handle,
                    error = %e,
                    "Account gone, removing subscription"
                );
                tx.delete().await?;
                tx.commit().await?;
                return Ok(CycleOutcome::AccountGone);
            }
            Err(e) => {
                warn!(
                    subscription_id = %id,
                    handle = %subscription.handle,
                    error = %e,
                    "Timeline fetch failed"
                );
                tx.rollback().await;
                return Ok(CycleOutcome::SourceFailed);
            }
        };

        let Some(next) = &result.next_cursor else {
            tx.rollback().await;
            return Ok(CycleOutcome::Idle);
        };
        subscription.advance(next);
        tx.put(subscription.clone()).await?;

        if result.seeded {
            tx.commit().await?;
            info!(subscription_id = %id, last_item_id = %next.id, "Seeded subscription");
            return Ok(CycleOutcome::Seeded);
        }

        let Some(batch) = render::render(
            result.items,
            subscription.ignore_replies,
            subscription.ignore_retweets,
            &subscription.handle,
            self.timezone,
        ) else {
            tx.commit().await?;
            return Ok(CycleOutcome::Idle);
        };

        if let Err(e) = self
            .notifier
            .send(&destination, &batch.summary, &batch.messages)
            .await
        {
            warn!(
                subscription_id = %id,
                channel_id = %destination.channel_id,
                error = %e,
                "Delivery failed, keeping checkpoint"
            );
            tx.rollback().await;
            return Ok(CycleOutcome::DeliveryFailed);
        }

        tx.commit().await?;
        info!(
            subscription_id = %id,
            handle = %subscription.handle,
            count = batch.total,
            pages = result.pages,
            "Delivered new activity"
        );
        Ok(CycleOutcome::Delivered { count: batch.total })
    }
}

#[async_trait]
impl CycleRunner for CycleCoordinator {
    async fn run_cycle(&self, id: &str) -> CycleOutcome {
        self.run(id).await
    }
}
