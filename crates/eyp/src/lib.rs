//! # EYP
//!
//! The unified API for building, signing and dispatching e-Yazışma
//! packages (EYP).
//!
//! ## Overview
//!
//! - **Packaging**: attachments are fetched in parallel, unavailable ones
//!   are left out, and the cover document, metadata and attachments are
//!   sealed into one `.eyp` container
//! - **Signing**: a user-triggered attempt obtains a single-use session,
//!   finds the local signing application and asks it to sign the cover
//!   digest
//! - **Status**: `created → signed → sent`, or `cancelled`. A signature over
//!   any digest other than the sealed one is refused
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use eyp::{EypConfig, EypService, MemorySource, NewPackage};
//! use eyp::core::{CoverDocument, PackageMetadata};
//! use eyp::store::SqliteStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(cover: Vec<u8>, metadata: PackageMetadata) -> eyp::Result<()> {
//! let store = SqliteStore::open("eyp.db")?;
//! let service = EypService::connect(store, Arc::new(MemorySource::new()), EypConfig::default())?;
//!
//! let created = service
//!     .create_package(NewPackage::new(CoverDocument::new("ust-yazi.pdf", cover), metadata))
//!     .await?;
//!
//! let id = created.envelope.id;
//! if let Err(e) = service.sign_package(&id, CancellationToken::new()).await {
//!     eprintln!("{} ({})", e, e.hint().unwrap_or_default());
//! }
//!
//! let download = service.download(&id).await?;
//! println!("{}: {} bytes", download.file_name, download.bytes.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `eyp::core` - Digests, metadata, container, status machine
//! - `eyp::store` - Storage abstraction and SQLite
//! - `eyp::signer` - Session broker and signer agent client

pub mod attachments;
pub mod config;
pub mod error;
pub mod service;

pub use eyp_core as core;
pub use eyp_signer as signer;
pub use eyp_store as store;

pub use attachments::{resolve_attachments, AttachmentSource, MemorySource, ResolvedAttachments};
pub use config::EypConfig;
pub use error::{AttachmentUnavailable, EypError, Result};
pub use service::{Created, Download, EypService, NewPackage};

pub use eyp_core::{
    CoverDocument, DeliveryTarget, DocumentEnvelope, PackageId, PackageMetadata, PackageStatus,
    SignerInfo,
};
