//! Document envelope: a sealed package plus its lifecycle state.
//!
//! Content fields never change after [`DocumentEnvelope::created`]. Only
//! `status`, `signed_at` and `signature` move afterwards, through the
//! transitions in [`status`](crate::status).

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::container::{container_file_name, BuiltPackage, ManifestEntry};
use crate::digest::Sha256Digest;
use crate::metadata::ValidatedMetadata;
use crate::status::{PackageStatus, SignatureResult};
use crate::types::PackageId;

/// A person expected to sign. Descriptive only, not a cryptographic identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    /// Acting capacity ("makam").
    pub capacity: Option<String>,
}

impl SignerInfo {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            title: None,
            capacity: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_capacity(mut self, capacity: impl Into<String>) -> Self {
        self.capacity = Some(capacity.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Human-readable description of what is being signed.
///
/// The signer agent displays this before asking for the user's PIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub number: String,
    pub date: NaiveDate,
    pub subject: String,
    pub recipient: Option<String>,
}

impl DocumentContext {
    /// Take number, date, subject and recipients from validated metadata.
    /// Several recipients are joined with `", "`.
    pub fn from_validated(metadata: &ValidatedMetadata<'_>) -> Self {
        let recipient = if metadata.recipients.is_empty() {
            None
        } else {
            Some(
                metadata
                    .recipients
                    .iter()
                    .map(|r| r.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };

        Self {
            number: metadata.document_number.to_string(),
            date: metadata.date,
            subject: metadata.subject.to_string(),
            recipient,
        }
    }
}

/// A built package and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEnvelope {
    pub id: PackageId,
    pub document_number: String,
    /// Creation time (Unix milliseconds).
    pub created_at: i64,
    pub cover_digest: Sha256Digest,
    pub cover_size: u64,
    pub context: DocumentContext,
    pub attachments: Vec<ManifestEntry>,
    pub signers: Vec<SignerInfo>,
    pub status: PackageStatus,
    /// When the package was signed (Unix milliseconds).
    pub signed_at: Option<i64>,
    pub signature: Option<SignatureResult>,
    /// The sealed `.eyp` container.
    pub container: Bytes,
}

impl DocumentEnvelope {
    /// Wrap a freshly built package. Status starts at `created`.
    pub fn created(built: BuiltPackage, now: i64) -> Self {
        Self {
            id: PackageId::generate(),
            document_number: built.context.number.clone(),
            created_at: now,
            cover_digest: built.cover_digest,
            cover_size: built.cover_size,
            context: built.context,
            attachments: built.manifest,
            signers: built.signers,
            status: PackageStatus::Created,
            signed_at: None,
            signature: None,
            container: built.bytes,
        }
    }

    /// Download name of the container.
    pub fn file_name(&self) -> String {
        container_file_name(&self.document_number)
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}
