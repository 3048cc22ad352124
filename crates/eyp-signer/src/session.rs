//! Signing sessions and the broker that issues them.
//!
//! A session is a short-lived token issued by the backend authority. It
//! authorizes exactly one sign call: [`SigningSession`] is not `Clone`, and
//! [`SignerAgent::sign_hash`](crate::agent::SignerAgent::sign_hash) takes it
//! by value. Expiry is enforced by the authority and never extended here.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SignerConfig;
use crate::error::{Result, SignerError};

/// A single-use signing session.
pub struct SigningSession {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SigningSession {
    pub fn new(
        token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at,
        }
    }

    /// The opaque bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSession")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues signing sessions.
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Obtain a fresh session for one signing attempt.
    async fn request_session_token(&self) -> Result<SigningSession>;
}

/// Body returned by the session endpoint.
#[derive(Debug, Deserialize)]
struct SessionGrant {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Requests sessions from the backend authority over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionBroker {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<String>,
}

impl HttpSessionBroker {
    pub fn new(config: &SignerConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.session_timeout)
            .connect_timeout(config.connect_timeout);
        if is_loopback(&config.session_endpoint) {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint: config.session_endpoint.clone(),
            credential: config.backend_credential.clone(),
        })
    }
}

fn is_loopback(endpoint: &str) -> bool {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| matches!(host.as_str(), "127.0.0.1" | "localhost" | "[::1]"))
        .unwrap_or(false)
}

#[async_trait]
impl SessionBroker for HttpSessionBroker {
    async fn request_session_token(&self) -> Result<SigningSession> {
        let mut request = self.client.post(&self.endpoint);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        let response = request.send().await.map_err(|e| {
            SignerError::SessionUnavailable(if e.is_connect() {
                format!("cannot connect to {}", self.endpoint)
            } else {
                e.to_string()
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignerError::SessionUnavailable(format!(
                "authority returned HTTP {}",
                status.as_u16()
            )));
        }

        let grant: SessionGrant = response
            .json()
            .await
            .map_err(|e| SignerError::SessionUnavailable(format!("malformed session: {}", e)))?;

        if grant.token.trim().is_empty() {
            return Err(SignerError::SessionUnavailable(
                "authority issued an empty token".into(),
            ));
        }

        tracing::debug!(expires_at = %grant.expires_at, "signing session issued");

        Ok(SigningSession::new(
            grant.token,
            grant.issued_at,
            grant.expires_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_token() {
        let now = Utc::now();
        let session = SigningSession::new("s3cr3t-token", now, now + Duration::minutes(5));
        let printed = format!("{:?}", session);
        assert!(!printed.contains("s3cr3t-token"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let session = SigningSession::new("t", now, now + Duration::seconds(60));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::seconds(60)));
        assert!(session.is_expired(now + Duration::seconds(61)));
    }

    #[test]
    fn test_loopback_endpoints() {
        assert!(is_loopback("http://127.0.0.1:8080/session"));
        assert!(is_loopback("http://localhost/session"));
        assert!(!is_loopback("https://imza.example.org/session"));
        assert!(!is_loopback("not a url"));
    }

    #[test]
    fn test_grant_parses_rfc3339() {
        let grant: SessionGrant = serde_json::from_str(
            r#"{"token":"abc","issued_at":"2026-03-01T10:00:00Z","expires_at":"2026-03-01T10:05:00Z"}"#,
        )
        .unwrap();
        assert_eq!(grant.token, "abc");
        assert_eq!((grant.expires_at - grant.issued_at).num_minutes(), 5);
    }
}
