//! # EYP Store
//!
//! Storage abstraction for EYP packages. Provides a trait-based interface
//! for envelope persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`PackageStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`UpdateResult`] - Outcome of a compare-and-set status write
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eyp_store::{SqliteStore, PackageStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("eyp.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let created = store.list_packages(None).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: inserting the same package ID twice returns `AlreadyExists`
//! - **Compare-and-set status**: stale writers are refused, never merged

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, PackageStore, PackageSummary, StatusUpdate, UpdateResult};
