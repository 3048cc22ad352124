//! Error types for the EYP service.

use eyp_core::{BuildError, PackageId, PackageStatus, StatusError};
use eyp_signer::{AttemptState, SignerError};
use eyp_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum EypError {
    /// The package could not be built. Nothing was stored.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// A status transition was refused. The stored package is unchanged.
    #[error("status error: {0}")]
    Status(#[from] StatusError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The signing pipeline could not be set up.
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// A signing attempt ended without a signature.
    #[error("signing attempt ended in {state}: {source}")]
    Signing {
        state: AttemptState,
        #[source]
        source: SignerError,
    },

    /// Package not found.
    #[error("package not found: {0}")]
    NotFound(PackageId),

    /// Freshly generated package ID collided with a stored one.
    #[error("package already exists: {0}")]
    AlreadyExists(PackageId),

    /// Another writer changed the status first.
    #[error("package status changed concurrently, now {current}")]
    StaleStatus { current: PackageStatus },
}

impl EypError {
    /// Remediation text for a failed signing attempt.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Signing { source, .. } | Self::Signer(source) => Some(source.hint()),
            Self::Status(StatusError::DigestMismatch { .. }) => Some(
                "the signing application signed a different document; the package was not changed"
                    .into(),
            ),
            _ => None,
        }
    }
}

/// Error for one attachment that could not be fetched.
///
/// Never fatal: the attachment is left out of the package.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attachment {key} unavailable: {reason}")]
pub struct AttachmentUnavailable {
    pub key: String,
    pub reason: String,
}

impl AttachmentUnavailable {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, EypError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_error_carries_hint() {
        let err = EypError::Signing {
            state: AttemptState::AgentNotFound,
            source: SignerError::AgentUnavailable { port: 8099 },
        };
        assert!(err.to_string().starts_with("signing attempt ended in agent_not_found"));
        assert!(err.hint().unwrap().contains("8099"));
    }

    #[test]
    fn test_store_errors_have_no_hint() {
        let err = EypError::from(StoreError::NotFound(PackageId::generate()));
        assert!(err.hint().is_none());
    }
}
