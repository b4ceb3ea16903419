//! Subscription management.

use std::sync::Arc;

use tracing::info;

use crate::engine::SyncEngine;
use crate::scheduler::Scheduler;
use crate::store::SubscriptionStore;

use super::error::SubscriptionError;
use super::model::{SubscribeRequest, Subscription};

type Result<T> = std::result::Result<T, SubscriptionError>;

/// Creates, removes and lists subscriptions, keeping the scheduler in step.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    engine: SyncEngine,
    scheduler: Scheduler,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        engine: SyncEngine,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            store,
            engine,
            scheduler,
        }
    }

    /// Subscribe a channel to an account's timeline.
    ///
    /// The subscription is seeded from the account's most recent item without
    /// notifying, persisted, then scheduled.
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription> {
        let mut subscription = Subscription::new(request);

        let seed = self
            .engine
            .synchronize(&subscription.handle, subscription.feed, None, None)
            .await?;
        if let Some(checkpoint) = &seed.next_cursor {
            subscription.advance(checkpoint);
        }

        if self.store.create(&subscription).await?.is_some() {
            return Err(SubscriptionError::Duplicate {
                handle: subscription.handle,
                channel_id: subscription.channel_id,
            });
        }

        self.scheduler.schedule(&subscription.id).await;
        info!(
            subscription_id = %subscription.id,
            handle = %subscription.handle,
            feed = %subscription.feed,
            channel_id = %subscription.channel_id,
            seeded = !subscription.is_unseeded(),
            "Subscribed"
        );
        Ok(subscription)
    }

    /// Remove a subscription and cancel its job.
    pub async fn unsubscribe(&self, id: &str) -> Result<Subscription> {
        let mut tx = self.store.begin(id).await?;
        let subscription = tx
            .get()
            .await?
            .ok_or_else(|| SubscriptionError::NotFound(id.to_string()))?;
        tx.delete().await?;
        tx.commit().await?;

        self.scheduler.unschedule(id).await?;
        info!(subscription_id = %id, handle = %subscription.handle, "Unsubscribed");
        Ok(subscription)
    }

    /// List subscriptions, optionally for one channel.
    pub async fn list(&self, channel_id: Option<&str>) -> Result<Vec<Subscription>> {
        Ok(self.store.list(channel_id).await?)
    }

    /// Human-readable one-line description.
    pub fn describe(subscription: &Subscription) -> String {
        let replies = if subscription.ignore_replies {
            "Ignore Replies"
        } else {
            "Including Replies"
        };
        let retweets = if subscription.ignore_retweets {
            "Ignore Retweets"
        } else {
            "Including Retweets"
        };
        let channel = match &subscription.guild_id {
            Some(guild_id) => format!(
                "https://discord.com/channels/{}/{}",
                guild_id, subscription.channel_id
            ),
            None => format!("<#{}>", subscription.channel_id),
        };

        format!(
            " - Subscribing [@{handle}]({url})'s {feed} Tab into {channel} ({replies}, {retweets})",
            handle = subscription.handle,
            url = subscription.profile_url(),
            feed = subscription.feed,
        )
    }
}
