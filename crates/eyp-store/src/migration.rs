//! SQLite schema versions.
//!
//! Each step in [`STEPS`] moves the schema from `version - 1` to `version`
//! and is recorded in `schema_migrations`. Pending steps run in one
//! transaction.

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "packages",
    sql: r#"
        CREATE TABLE packages (
            package_id      BLOB PRIMARY KEY,   -- 16 bytes
            document_number TEXT NOT NULL,
            created_at      INTEGER NOT NULL,   -- Unix ms
            cover_digest    BLOB NOT NULL,      -- SHA-256 of the cover document
            cover_size      INTEGER NOT NULL,
            context         BLOB NOT NULL,      -- CBOR
            attachments     BLOB NOT NULL,      -- CBOR manifest
            signers         BLOB NOT NULL,      -- CBOR
            status          TEXT NOT NULL,
            signed_at       INTEGER,
            signature       BLOB,               -- CBOR
            container       BLOB NOT NULL,      -- sealed .eyp
            updated_at      INTEGER NOT NULL
        );
        CREATE INDEX idx_packages_status ON packages(status);
        CREATE INDEX idx_packages_created ON packages(created_at);
    "#,
}];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = 1;

/// Version recorded in the database, 0 for a fresh one.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to run on every open.
///
/// A database written by a newer build is refused rather than touched.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Schema(format!(
            "database is at version {}, this build only knows up to {}",
            found, CURRENT_VERSION
        )));
    }

    let pending: Vec<&Step> = STEPS.iter().filter(|s| s.version > found).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![step.version, step.name, now_millis()],
        )?;
        tracing::debug!(version = step.version, name = step.name, "applied schema step");
    }
    tx.commit()?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
