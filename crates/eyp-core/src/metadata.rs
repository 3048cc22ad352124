//! Package metadata: who sends what to whom.
//!
//! [`PackageMetadata`] is the input shape. It is assembled from directory
//! and document records, so its required fields may be absent. Only a
//! [`ValidatedMetadata`], produced by
//! [`validate_metadata`](crate::validation::validate_metadata), can be
//! serialized; its required fields are not optional.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::digest::{DigestAlgorithm, Sha256Digest};

/// Scenario label written when the caller does not set one.
pub const DEFAULT_SCENARIO: &str = "eyazisma";

/// Language code written when the caller does not set one.
pub const DEFAULT_LANGUAGE: &str = "tr";

/// A sender or recipient (institution, unit or person).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Directory identifier (e.g. institution code).
    pub id: Option<String>,
    /// Display name. Required for the sender and for every recipient.
    pub name: Option<String>,
    /// Role or title within the correspondence.
    pub role: Option<String>,
}

impl Party {
    /// A party with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            role: None,
        }
    }

    /// Set the directory identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// A delivery target, e.g. a registered e-mail (KEP) address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub target: String,
    pub purpose: Option<String>,
}

impl DeliveryTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            purpose: None,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Metadata for one outgoing document, as assembled by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub scenario: String,
    pub language: String,
    pub document_number: Option<String>,
    pub date: Option<NaiveDate>,
    pub subject: Option<String>,
    pub sender: Party,
    pub recipients: Vec<Party>,
    pub delivery_targets: Vec<DeliveryTarget>,
}

impl Default for PackageMetadata {
    fn default() -> Self {
        Self {
            scenario: DEFAULT_SCENARIO.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            document_number: None,
            date: None,
            subject: None,
            sender: Party::default(),
            recipients: Vec::new(),
            delivery_targets: Vec::new(),
        }
    }
}

impl PackageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_number(mut self, number: impl Into<String>) -> Self {
        self.document_number = Some(number.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn sender(mut self, sender: Party) -> Self {
        self.sender = sender;
        self
    }

    pub fn recipient(mut self, recipient: Party) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }
}

/// A party whose required name is known to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedParty<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub role: Option<&'a str>,
}

/// Metadata that passed validation. Borrowed from a [`PackageMetadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMetadata<'a> {
    pub scenario: &'a str,
    pub language: &'a str,
    pub document_number: &'a str,
    pub date: NaiveDate,
    pub subject: &'a str,
    pub sender: ValidatedParty<'a>,
    pub recipients: Vec<ValidatedParty<'a>>,
    pub delivery_targets: &'a [DeliveryTarget],
}

/// Descriptor of the embedded (cover) document.
///
/// Only the package builder creates these, from the bytes it is about to
/// seal, so the digest always comes from the integrity engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedFile {
    name: String,
    signed_name: String,
    media_type: String,
    size: u64,
    digest: Sha256Digest,
}

impl EmbeddedFile {
    pub(crate) fn new(
        name: String,
        signed_name: String,
        media_type: String,
        size: u64,
        digest: Sha256Digest,
    ) -> Self {
        Self {
            name,
            signed_name,
            media_type,
            size,
            digest,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name the document takes once signed.
    pub fn signed_name(&self) -> &str {
        &self.signed_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.digest.algorithm()
    }
}
