//! In-memory implementation of the PackageStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use eyp_core::{DocumentEnvelope, PackageId, PackageStatus};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, PackageStore, PackageSummary, StatusUpdate, UpdateResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<HashMap<PackageId, DocumentEnvelope>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored packages.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<PackageId, DocumentEnvelope>>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<PackageId, DocumentEnvelope>>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn insert_package(&self, envelope: &DocumentEnvelope) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.contains_key(&envelope.id) {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.insert(envelope.id, envelope.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_package(&self, id: &PackageId) -> Result<Option<DocumentEnvelope>> {
        let inner = self.read()?;
        Ok(inner.get(id).cloned())
    }

    async fn get_status(&self, id: &PackageId) -> Result<Option<PackageStatus>> {
        let inner = self.read()?;
        Ok(inner.get(id).map(|e| e.status))
    }

    async fn list_packages(&self, status: Option<PackageStatus>) -> Result<Vec<PackageSummary>> {
        let inner = self.read()?;

        let mut packages: Vec<PackageSummary> = inner
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .map(|e| PackageSummary {
                id: e.id,
                document_number: e.document_number.clone(),
                status: e.status,
                created_at: e.created_at,
                signed_at: e.signed_at,
            })
            .collect();
        packages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(packages)
    }

    async fn update_status(
        &self,
        id: &PackageId,
        expected: PackageStatus,
        update: StatusUpdate,
    ) -> Result<UpdateResult> {
        let mut inner = self.write()?;

        let envelope = inner
            .get_mut(id)
            .ok_or(StoreError::NotFound(*id))?;

        if envelope.status != expected {
            return Ok(UpdateResult::Stale {
                current: envelope.status,
            });
        }

        envelope.status = update.status;
        if update.signed_at.is_some() {
            envelope.signed_at = update.signed_at;
        }
        if update.signature.is_some() {
            envelope.signature = update.signature;
        }

        Ok(UpdateResult::Updated)
    }
}
