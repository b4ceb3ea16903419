//! Scheduler service.
//!
//! Owns a registry of subscription id to cancellable timer task. Each task
//! sleeps until the next cadence boundary, then runs one cycle through the
//! [`CycleRunner`]. Cycles of the same subscription never overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cycle::CycleOutcome;
use crate::store::{StorageResult, SubscriptionStore};
use crate::subscription::SubscriptionId;
use crate::sync::KeyedLocks;

use super::cadence::Cadence;
use super::error::{Result, SchedulerError};

/// Executes one polling cycle for a subscription.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self, id: &str) -> CycleOutcome;
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous cycle for the same subscription was still running.
    Skipped,
    Ran(CycleOutcome),
}

struct Job {
    generation: u64,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    cadence: Cadence,
    runner: Arc<dyn CycleRunner>,
    jobs: RwLock<HashMap<SubscriptionId, Job>>,
    busy: KeyedLocks,
    generation: AtomicU64,
}

/// Handle to the scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(cadence: Cadence, runner: Arc<dyn CycleRunner>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cadence,
                runner,
                jobs: RwLock::new(HashMap::new()),
                busy: KeyedLocks::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Schedule one job per subscription in the store.
    ///
    /// Returns the number of jobs created.
    pub async fn start(&self, store: &dyn SubscriptionStore) -> StorageResult<usize> {
        let subscriptions = store.list(None).await?;
        let mut scheduled = 0;
        for subscription in &subscriptions {
            if self.schedule(&subscription.id).await {
                scheduled += 1;
            }
        }

        info!(
            scheduled,
            interval_minutes = self.inner.cadence.minutes(),
            "Scheduler started"
        );
        Ok(scheduled)
    }

    /// Start a job for `id`.
    ///
    /// Returns `false` if a job already exists.
    pub async fn schedule(&self, id: &str) -> bool {
        let mut jobs = self.inner.jobs.write().await;
        if jobs.contains_key(id) {
            return false;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(self.clone().run_job(id.to_string(), generation, cancel_rx));

        jobs.insert(
            id.to_string(),
            Job {
                generation,
                cancel: cancel_tx,
                task,
            },
        );
        debug!(subscription_id = %id, "Scheduled job");
        true
    }

    /// Cancel the job for `id`. A cycle already in flight runs to completion.
    pub async fn unschedule(&self, id: &str) -> Result<()> {
        let job = self
            .inner
            .jobs
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SchedulerError::NotScheduled(id.to_string()))?;

        let _ = job.cancel.send(());
        self.inner.busy.remove(id);
        debug!(subscription_id = %id, "Unscheduled job");
        Ok(())
    }

    pub async fn is_scheduled(&self, id: &str) -> bool {
        self.inner.jobs.read().await.contains_key(id)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    /// Cancel every job and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        let jobs: Vec<(SubscriptionId, Job)> = self.inner.jobs.write().await.drain().collect();
        let count = jobs.len();

        let mut tasks = Vec::with_capacity(count);
        for (id, job) in jobs {
            let _ = job.cancel.send(());
            self.inner.busy.remove(&id);
            tasks.push(job.task);
        }
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Job task failed");
            }
        }

        info!(jobs = count, "Scheduler stopped");
    }

    /// Run one cycle for `id` unless one is already running.
    pub async fn tick(&self, id: &str) -> TickOutcome {
        let Some(_busy) = self.inner.busy.try_acquire(id) else {
            warn!(subscription_id = %id, "Previous cycle still running, skipping tick");
            return TickOutcome::Skipped;
        };

        TickOutcome::Ran(self.inner.runner.run_cycle(id).await)
    }

    async fn run_job(
        self,
        id: SubscriptionId,
        generation: u64,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        // Boundaries are wall-clock; deadlines are offsets from one anchor.
        let started = Instant::now();
        let started_at = Utc::now();
        let mut after = started_at;

        loop {
            let Some(next) = self.inner.cadence.next_after(&after) else {
                error!(subscription_id = %id, "Cadence produced no further boundaries");
                break;
            };
            let deadline = started + Cadence::delay_until(started_at, next);

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = &mut cancel_rx => {
                    debug!(subscription_id = %id, "Job cancelled");
                    return;
                }
            }
            if let TickOutcome::Ran(outcome) = self.tick(&id).await
                && outcome.is_terminal()
            {
                info!(subscription_id = %id, outcome = ?outcome, "Stopping job");
                break;
            }

            // Boundaries that passed while the cycle ran are skipped.
            let elapsed = TimeDelta::from_std(started.elapsed()).unwrap_or_default();
            after = next.max(started_at + elapsed);
        }

        self.release(&id, generation).await;
    }

    /// Remove a job from inside its own task.
    async fn release(&self, id: &str, generation: u64) {
        let mut jobs = self.inner.jobs.write().await;
        if jobs.get(id).is_some_and(|job| job.generation == generation) {
            jobs.remove(id);
            self.inner.busy.remove(id);
        }
    }
}
