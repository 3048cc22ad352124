//! Error types for the signing pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors that end a signing attempt.
///
/// None of these change package status. The package stays `created` and
/// a new attempt can be started with a fresh session.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The backend authority could not issue a session token.
    #[error("signing session unavailable: {0}")]
    SessionUnavailable(String),

    /// The session expired before it was presented.
    #[error("signing session expired")]
    SessionExpired,

    /// Nothing is listening on the configured loopback port.
    #[error("signer agent unavailable on port {port}")]
    AgentUnavailable { port: u16 },

    /// The user declined or cancelled in the signing application.
    #[error("signing declined: {0}")]
    SigningDeclined(String),

    /// The agent answered, but not with a signature.
    #[error("signing error: {reason}")]
    SigningError {
        reason: String,
        /// The agent refused the session token (HTTP 401/403).
        unauthorized: bool,
    },

    /// The agent did not answer within the configured timeout.
    #[error("signer agent did not respond within {}s", .after.as_secs())]
    NetworkTimeout { after: Duration },

    /// The attempt was cancelled on this side.
    #[error("signing cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SignerError {
    pub(crate) fn signing(reason: impl Into<String>) -> Self {
        Self::SigningError {
            reason: reason.into(),
            unauthorized: false,
        }
    }

    pub(crate) fn unauthorized(status: u16) -> Self {
        Self::SigningError {
            reason: format!("agent rejected the session token (HTTP {})", status),
            unauthorized: true,
        }
    }

    /// What the user can do about it.
    pub fn hint(&self) -> String {
        match self {
            Self::SessionUnavailable(_) => {
                "the signing authority could not issue a session; check the server connection and try again".into()
            }
            Self::SessionExpired => "the signing session expired; start a new signing attempt".into(),
            Self::AgentUnavailable { port } => format!(
                "check that the signing application is running and listening on port {}",
                port
            ),
            Self::SigningDeclined(_) => {
                "the signature was declined in the signing application; start a new attempt to sign".into()
            }
            Self::SigningError {
                unauthorized: true, ..
            } => "the signing application did not accept the session; check that it is paired with this server".into(),
            Self::SigningError { .. } => {
                "check the smart card, its PIN, and the signing application log".into()
            }
            Self::NetworkTimeout { .. } => {
                "the signing application did not answer in time; check that it is still responsive".into()
            }
            Self::Cancelled => "signing was cancelled; the package is unchanged".into(),
            Self::Http(_) => "check the loopback connection to the signing application".into(),
        }
    }
}

/// Result type for signing operations.
pub type Result<T> = std::result::Result<T, SignerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_hint_names_port() {
        let err = SignerError::AgentUnavailable { port: 8099 };
        assert!(err.hint().contains("port 8099"));
        assert_eq!(err.to_string(), "signer agent unavailable on port 8099");
    }

    #[test]
    fn test_unauthorized_has_its_own_hint() {
        let plain = SignerError::signing("card removed");
        let denied = SignerError::unauthorized(401);
        assert_ne!(plain.hint(), denied.hint());
        assert!(denied.to_string().contains("401"));
    }

    #[test]
    fn test_timeout_message() {
        let err = SignerError::NetworkTimeout {
            after: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "signer agent did not respond within 300s");
    }
}
