//! Storage abstraction layer.
//!
//! Trait interfaces live here; file-based implementations are in [`file`].
//!
//! # Naming Conventions
//!
//! - `begin` - open a transaction on one row
//! - `create` - insert a new entity, checked against uniqueness constraints
//! - `list` - enumerate entities outside a transaction
//! - `get` - read the transaction's row, `None` if absent
//! - `put` - create or update (upsert semantics)
//! - `delete` - remove the row

pub mod error;

mod subscription;

pub mod file;

pub use error::{StorageError, StorageResult};
pub use subscription::{SubscriptionStore, Transaction};
