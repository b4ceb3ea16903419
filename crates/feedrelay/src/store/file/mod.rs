//! File-based storage implementations.
//!
//! Subscriptions are stored as individual YAML documents. All writes use
//! atomic operations (temp file + rename) to prevent corruption.

mod subscription;

pub use subscription::FileSubscriptionStore;
