//! Loopback wire messages exchanged with the signer agent.
//!
//! Both directions are JSON.
//!
//! ```text
//! GET  /status   -> 2xx when the agent is up
//! POST /sign     SignHashRequest -> SignResponse
//! ```

use serde::{Deserialize, Serialize};

use eyp_core::{DigestAlgorithm, DocumentContext, SignatureResult};

use crate::error::{Result, SignerError};

/// `code` value for a user who declined in the agent.
pub const CODE_DECLINED: &str = "declined";

/// `code` value for a user who cancelled in the agent.
pub const CODE_CANCELLED: &str = "cancelled";

/// Body of `POST /sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignHashRequest {
    /// Lowercase hex digest of the cover document.
    pub digest: String,
    pub algorithm: DigestAlgorithm,
    /// Shown to the user before PIN entry.
    pub context: DocumentContext,
}

impl SignHashRequest {
    pub fn new(digest: impl Into<String>, context: DocumentContext) -> Self {
        Self {
            digest: digest.into(),
            algorithm: DigestAlgorithm::Sha256,
            context,
        }
    }
}

/// Body returned by `POST /sign`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub success: bool,
    #[serde(default)]
    pub signature: Option<String>,
    /// Digest the agent actually signed.
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Unix milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl SignResponse {
    /// Interpret the response for a request that presented `requested`.
    ///
    /// The digest the agent reports is recorded as-is; comparing it against
    /// the package is the status machine's job. A missing digest is taken
    /// to mean the requested one.
    pub fn into_result(self, requested: &str, now: i64) -> Result<SignatureResult> {
        if !self.success {
            let detail = self
                .error
                .unwrap_or_else(|| "agent reported failure".to_string());
            return match self.code.as_deref() {
                Some(CODE_DECLINED) | Some(CODE_CANCELLED) => {
                    Err(SignerError::SigningDeclined(detail))
                }
                _ => Err(SignerError::signing(detail)),
            };
        }

        let signature = match self.signature {
            Some(s) if !s.trim().is_empty() => s,
            _ => {
                tracing::warn!("agent reported success without a signature");
                return Err(SignerError::signing("agent response has no signature"));
            }
        };

        let algorithm = match self.algorithm.as_deref() {
            None => DigestAlgorithm::Sha256,
            Some(name) => DigestAlgorithm::parse(name).ok_or_else(|| {
                tracing::warn!(algorithm = name, "agent used an unsupported digest algorithm");
                SignerError::signing(format!("unsupported digest algorithm: {}", name))
            })?,
        };

        Ok(SignatureResult {
            algorithm,
            digest: self.digest.unwrap_or_else(|| requested.to_string()),
            signature,
            timestamp: self.timestamp.unwrap_or(now),
            success: true,
            error: None,
        })
    }
}
