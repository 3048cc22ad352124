//! Package status state machine.
//!
//! ```text
//! created ──sign──▶ signed ──send──▶ sent
//!    │                 │
//!    └──cancel──▶ cancelled ◀──cancel──┘
//! ```
//!
//! `created → signed` is only taken for a successful [`SignatureResult`]
//! whose presented digest equals the cover digest sealed at build time.
//! Every refused transition leaves the envelope untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::{DigestAlgorithm, Sha256Digest};
use crate::envelope::DocumentEnvelope;
use crate::error::StatusError;

/// Lifecycle status of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Created,
    Signed,
    Sent,
    Cancelled,
}

impl PackageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Signed => "signed",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "signed" => Some(Self::Signed),
            "sent" => Some(Self::Sent),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether `self → next` is an allowed edge.
    pub fn can_transition_to(self, next: PackageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Signed)
                | (Self::Signed, Self::Sent)
                | (Self::Created, Self::Cancelled)
                | (Self::Signed, Self::Cancelled)
        )
    }

    /// No transition leaves this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one signing call, as reported by the signer agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResult {
    pub algorithm: DigestAlgorithm,
    /// Digest value the agent actually signed (hex).
    pub digest: String,
    /// Opaque signature payload.
    pub signature: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub success: bool,
    pub error: Option<String>,
}

impl SignatureResult {
    /// Does the presented digest match `expected`? Hex case is ignored.
    pub fn matches(&self, expected: &Sha256Digest) -> bool {
        self.algorithm == DigestAlgorithm::Sha256
            && Sha256Digest::from_hex(&self.digest)
                .map(|d| d == *expected)
                .unwrap_or(false)
    }
}

impl DocumentEnvelope {
    fn check_transition(&self, next: PackageStatus) -> Result<(), StatusError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(StatusError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Check a signature result against this envelope without applying it.
    pub fn verify_signature(&self, result: &SignatureResult) -> Result<(), StatusError> {
        self.check_transition(PackageStatus::Signed)?;

        if !result.success {
            return Err(StatusError::SignatureFailed(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "no error detail".to_string()),
            ));
        }

        if !result.matches(&self.cover_digest) {
            tracing::warn!(
                package = %self.id,
                expected = %self.cover_digest,
                presented = %result.digest,
                algorithm = %result.algorithm,
                "signature digest does not match sealed cover digest"
            );
            return Err(StatusError::DigestMismatch {
                expected: self.cover_digest.to_hex(),
                presented: result.digest.clone(),
            });
        }

        Ok(())
    }

    /// `created → signed`. On any error the envelope stays `created`.
    pub fn apply_signature(&mut self, result: SignatureResult, now: i64) -> Result<(), StatusError> {
        self.verify_signature(&result)?;

        self.status = PackageStatus::Signed;
        self.signed_at = Some(now);
        self.signature = Some(result);

        tracing::info!(package = %self.id, status = %self.status, "package signed");
        Ok(())
    }

    /// `signed → sent`. Dispatch itself happens elsewhere.
    pub fn mark_sent(&mut self) -> Result<(), StatusError> {
        self.check_transition(PackageStatus::Sent)?;
        self.status = PackageStatus::Sent;
        tracing::info!(package = %self.id, status = %self.status, "package marked sent");
        Ok(())
    }

    /// `created | signed → cancelled`.
    pub fn cancel(&mut self) -> Result<(), StatusError> {
        self.check_transition(PackageStatus::Cancelled)?;
        self.status = PackageStatus::Cancelled;
        tracing::info!(package = %self.id, status = %self.status, "package cancelled");
        Ok(())
    }
}
