//! In-process scheduler driving one polling job per subscription.
//!
//! # Usage
//!
//! ```ignore
//! let cadence = Cadence::every_minutes(10)?;
//! let scheduler = Scheduler::new(cadence, Arc::new(coordinator));
//!
//! // One job per stored subscription
//! scheduler.start(&store).await?;
//!
//! // Jobs for new subscriptions
//! scheduler.schedule(&subscription.id).await;
//!
//! scheduler.unschedule(&subscription.id).await?;
//! scheduler.shutdown().await;
//! ```

pub mod cadence;
pub mod error;
pub mod service;

pub use cadence::Cadence;
pub use error::{Result, SchedulerError};
pub use service::{CycleRunner, Scheduler, TickOutcome};
