//! Subscriptions and their lifecycle.

pub mod error;
pub mod model;
pub mod service;

pub use error::SubscriptionError;
pub use model::{SubscribeRequest, Subscription, SubscriptionId};
pub use service::SubscriptionService;
