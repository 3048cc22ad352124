//! SQLite implementation of the PackageStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use eyp_core::{DocumentEnvelope, PackageId, PackageStatus, Sha256Digest};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, PackageStore, PackageSummary, StatusUpdate, UpdateResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Raw column values of one `packages` row.
struct PackageRow {
    package_id: Vec<u8>,
    document_number: String,
    created_at: i64,
    cover_digest: Vec<u8>,
    cover_size: i64,
    context: Vec<u8>,
    attachments: Vec<u8>,
    signers: Vec<u8>,
    status: String,
    signed_at: Option<i64>,
    signature: Option<Vec<u8>>,
    container: Vec<u8>,
}

const PACKAGE_COLUMNS: &str = "package_id, document_number, created_at, cover_digest, cover_size,
     context, attachments, signers, status, signed_at, signature, container";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PackageRow> {
    Ok(PackageRow {
        package_id: row.get("package_id")?,
        document_number: row.get("document_number")?,
        created_at: row.get("created_at")?,
        cover_digest: row.get("cover_digest")?,
        cover_size: row.get("cover_size")?,
        context: row.get("context")?,
        attachments: row.get("attachments")?,
        signers: row.get("signers")?,
        status: row.get("status")?,
        signed_at: row.get("signed_at")?,
        signature: row.get("signature")?,
        container: row.get("container")?,
    })
}

impl PackageRow {
    fn into_envelope(self) -> Result<DocumentEnvelope> {
        let id = PackageId::try_from(&self.package_id[..])
            .map_err(|_| StoreError::Corrupt("package_id must be 16 bytes".into()))?;
        let digest: [u8; 32] = self
            .cover_digest
            .try_into()
            .map_err(|_| StoreError::Corrupt("cover_digest must be 32 bytes".into()))?;

        Ok(DocumentEnvelope {
            id,
            document_number: self.document_number,
            created_at: self.created_at,
            cover_digest: Sha256Digest::from_bytes(digest),
            cover_size: self.cover_size as u64,
            context: decode("context", &self.context)?,
            attachments: decode("attachments", &self.attachments)?,
            signers: decode("signers", &self.signers)?,
            status: parse_status(&self.status)?,
            signed_at: self.signed_at,
            signature: self
                .signature
                .as_deref()
                .map(|bytes| decode("signature", bytes))
                .transpose()?,
            container: Bytes::from(self.container),
        })
    }
}

fn parse_status(s: &str) -> Result<PackageStatus> {
    PackageStatus::parse(s).ok_or_else(|| StoreError::Corrupt(format!("unknown status: {}", s)))
}

fn encode<T: Serialize>(column: &'static str, value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::codec(column, e))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(column: &'static str, bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::codec(column, e))
}

#[async_trait]
impl PackageStore for SqliteStore {
    async fn insert_package(&self, envelope: &DocumentEnvelope) -> Result<InsertResult> {
        let context = encode("context", &envelope.context)?;
        let attachments = encode("attachments", &envelope.attachments)?;
        let signers = encode("signers", &envelope.signers)?;
        let signature = envelope
            .signature
            .as_ref()
            .map(|s| encode("signature", s))
            .transpose()?;
        let envelope = envelope.clone();

        self.blocking(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM packages WHERE package_id = ?1",
                    params![envelope.id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(InsertResult::AlreadyExists);
            }

            conn.execute(
                "INSERT INTO packages (
                    package_id, document_number, created_at, cover_digest, cover_size,
                    context, attachments, signers, status, signed_at, signature,
                    container, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    envelope.id.as_bytes().as_slice(),
                    envelope.document_number,
                    envelope.created_at,
                    envelope.cover_digest.as_bytes().as_slice(),
                    envelope.cover_size as i64,
                    context,
                    attachments,
                    signers,
                    envelope.status.as_str(),
                    envelope.signed_at,
                    signature,
                    envelope.container.as_ref(),
                    envelope.created_at,
                ],
            )?;

            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_package(&self, id: &PackageId) -> Result<Option<DocumentEnvelope>> {
        let id = *id;

        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM packages WHERE package_id = ?1", PACKAGE_COLUMNS),
                    params![id.as_bytes().as_slice()],
                    read_row,
                )
                .optional()?;

            row.map(PackageRow::into_envelope).transpose()
        })
        .await
    }

    async fn get_status(&self, id: &PackageId) -> Result<Option<PackageStatus>> {
        let id = *id;

        self.blocking(move |conn| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM packages WHERE package_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            status.as_deref().map(parse_status).transpose()
        })
        .await
    }

    async fn list_packages(&self, status: Option<PackageStatus>) -> Result<Vec<PackageSummary>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT package_id, document_number, status, created_at, signed_at
                 FROM packages
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at, package_id",
            )?;

            let rows = stmt
                .query_map(params![status.map(PackageStatus::as_str)], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, document_number, status, created_at, signed_at)| -> Result<PackageSummary> {
                    Ok(PackageSummary {
                        id: PackageId::try_from(&id[..]).map_err(|_| {
                            StoreError::Corrupt("package_id must be 16 bytes".into())
                        })?,
                        document_number,
                        status: parse_status(&status)?,
                        created_at,
                        signed_at,
                    })
                })
                .collect()
        })
        .await
    }

    async fn update_status(
        &self,
        id: &PackageId,
        expected: PackageStatus,
        update: StatusUpdate,
    ) -> Result<UpdateResult> {
        let id = *id;
        let signature = update
            .signature
            .as_ref()
            .map(|s| encode("signature", s))
            .transpose()?;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE packages
                 SET status = ?1,
                     signed_at = COALESCE(?2, signed_at),
                     signature = COALESCE(?3, signature),
                     updated_at = ?4
                 WHERE package_id = ?5 AND status = ?6",
                params![
                    update.status.as_str(),
                    update.signed_at,
                    signature,
                    now_millis(),
                    id.as_bytes().as_slice(),
                    expected.as_str(),
                ],
            )?;

            if changed == 1 {
                tx.commit()?;
                return Ok(UpdateResult::Updated);
            }

            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM packages WHERE package_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            match current {
                Some(current) => Ok(UpdateResult::Stale {
                    current: parse_status(&current)?,
                }),
                None => Err(StoreError::NotFound(id)),
            }
        })
        .await
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
