//! Error types for package storage.

use std::fmt;

use eyp_core::PackageId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A CBOR column could not be written or read back.
    #[error("cannot encode/decode column {column}: {reason}")]
    Codec { column: &'static str, reason: String },

    #[error("no package with id {0}")]
    NotFound(PackageId),

    /// A stored row violates the schema (wrong blob length, unknown status).
    #[error("corrupt package row: {0}")]
    Corrupt(String),

    #[error("schema: {0}")]
    Schema(String),

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn codec(column: &'static str, err: impl fmt::Display) -> Self {
        Self::Codec {
            column,
            reason: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
