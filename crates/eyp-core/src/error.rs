//! Error types for EYP Core.

use thiserror::Error;

use crate::status::PackageStatus;

/// Metadata validation errors.
///
/// Serialization aborts on the first error; no partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required metadata field is missing: {field}")]
    MissingField { field: String },

    #[error("invalid value for metadata field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => field,
        }
    }
}

/// Errors that abort a package build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("cover document is empty")]
    EmptyDocument,

    #[error("metadata validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors from the package status state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PackageStatus,
        to: PackageStatus,
    },

    #[error("signature digest mismatch: package digest {expected}, presented {presented}")]
    DigestMismatch { expected: String, presented: String },

    #[error("signature result reports failure: {0}")]
    SignatureFailed(String),
}
