//! Store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing subscription rows.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed.
    #[error("failed to access {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A subscription file exists but is not a valid document.
    #[error("corrupt subscription file {path}: {message}")]
    FileDeserialization { path: PathBuf, message: String },

    /// A write targeted a row other than the one the transaction holds.
    #[error("transaction on {expected} cannot write subscription {actual}")]
    RowMismatch { expected: String, actual: String },

    /// A subscription could not be encoded.
    #[error("failed to encode subscription {id}: {message}")]
    Serialization { id: String, message: String },
}

impl StorageError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn file_deserialization(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn serialization(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            id: id.into(),
            message: message.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
