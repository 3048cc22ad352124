//! Store trait: the abstract interface for package persistence.
//!
//! The service is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use eyp_core::{DocumentEnvelope, PackageId, PackageStatus, SignatureResult};

use crate::error::Result;

/// Result of inserting a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Package was inserted.
    Inserted,
    /// A package with this ID already exists. Not an error.
    AlreadyExists,
}

/// Result of a compare-and-set status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// The stored status matched `expected` and was replaced.
    Updated,
    /// Someone else moved the package first. Nothing was written.
    Stale {
        /// The status currently stored.
        current: PackageStatus,
    },
}

/// Fields written by a status transition.
///
/// `signed_at` and `signature` are only written when `Some`; a `None`
/// keeps whatever the row already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: PackageStatus,
    pub signed_at: Option<i64>,
    pub signature: Option<SignatureResult>,
}

impl StatusUpdate {
    /// A bare status change.
    pub fn to(status: PackageStatus) -> Self {
        Self {
            status,
            signed_at: None,
            signature: None,
        }
    }

    /// Take status and signature fields from an envelope that has already
    /// been transitioned in memory.
    pub fn from_envelope(envelope: &DocumentEnvelope) -> Self {
        Self {
            status: envelope.status,
            signed_at: envelope.signed_at,
            signature: envelope.signature.clone(),
        }
    }
}

/// A listing row. Does not carry the container bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub id: PackageId,
    pub document_number: String,
    pub status: PackageStatus,
    pub created_at: i64,
    pub signed_at: Option<i64>,
}

/// The PackageStore trait: async interface for package persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Immutable content**: once inserted, only status, `signed_at` and
///   `signature` change.
/// - **Single writer**: status changes go through [`update_status`], a
///   compare-and-set on the current status. A writer that read an old
///   status gets [`UpdateResult::Stale`] instead of overwriting.
///
/// [`update_status`]: PackageStore::update_status
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Insert a freshly created package.
    async fn insert_package(&self, envelope: &DocumentEnvelope) -> Result<InsertResult>;

    /// Get a package by ID.
    async fn get_package(&self, id: &PackageId) -> Result<Option<DocumentEnvelope>>;

    /// Get only the status of a package.
    async fn get_status(&self, id: &PackageId) -> Result<Option<PackageStatus>>;

    /// List packages ordered by creation time, optionally filtered by status.
    async fn list_packages(&self, status: Option<PackageStatus>) -> Result<Vec<PackageSummary>>;

    /// Compare-and-set the status of a package.
    ///
    /// Writes `update` only if the stored status equals `expected`.
    /// Returns `StoreError::NotFound` for an unknown ID.
    async fn update_status(
        &self,
        id: &PackageId,
        expected: PackageStatus,
        update: StatusUpdate,
    ) -> Result<UpdateResult>;
}
