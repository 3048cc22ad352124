//! # EYP Core
//!
//! Pure primitives for building e-Yazışma packages (EYP): digests, package
//! metadata, canonical encoding, the sealed container, and the package
//! status state machine.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over in-memory buffers.
//!
//! ## Key Types
//!
//! - [`Sha256Digest`] - The single digest used everywhere in the system
//! - [`PackageMetadata`] - Sender, recipients, subject, delivery targets
//! - [`PackageBuilder`] - Assembles a cover document, metadata and
//!   attachments into one sealed container
//! - [`DocumentEnvelope`] - A built package plus its lifecycle status
//! - [`PackageStatus`] - `created → signed → sent`, or `cancelled`
//!
//! ## Canonicalization
//!
//! Metadata, manifest and container are encoded using deterministic CBOR.
//! See the [`canonical`] module.

pub mod canonical;
pub mod container;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod status;
pub mod types;
pub mod validation;

pub use canonical::{container_bytes, encode_metadata, manifest_bytes, metadata_bytes, signer_bytes};
pub use container::{
    build_package, container_file_name, Attachment, BuiltPackage, CoverDocument, EntryKind,
    ManifestEntry, PackageBuilder, CONTAINER_FORMAT,
};
pub use digest::{digest, DigestAlgorithm, Sha256Digest};
pub use envelope::{DocumentContext, DocumentEnvelope, SignerInfo};
pub use error::{BuildError, StatusError, ValidationError};
pub use metadata::{
    DeliveryTarget, EmbeddedFile, PackageMetadata, Party, ValidatedMetadata, DEFAULT_LANGUAGE,
    DEFAULT_SCENARIO,
};
pub use status::{PackageStatus, SignatureResult};
pub use types::PackageId;
pub use validation::validate_metadata;
