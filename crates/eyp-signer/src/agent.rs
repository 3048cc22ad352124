//! Signer agent: the locally running signing application.
//!
//! The agent is reached over loopback HTTP. Every call carries the session
//! token as a bearer credential. Two timeouts apply: a short one for the
//! availability probe, and a long one for signing, which waits on a human
//! entering a PIN. User cancellation is separate from both: it drops the
//! in-flight request.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use eyp_core::SignatureResult;

use crate::config::SignerConfig;
use crate::error::{Result, SignerError};
use crate::messages::{SignHashRequest, SignResponse};
use crate::session::SigningSession;

/// A signing application.
#[async_trait]
pub trait SignerAgent: Send + Sync {
    /// Loopback port the agent is expected on.
    fn port(&self) -> u16;

    /// Is the agent up? Bounded by a short timeout; never errors.
    async fn check_availability(&self, session: &SigningSession) -> bool;

    /// Ask the agent to sign `request.digest`.
    ///
    /// Consumes the session. Returns [`SignerError::Cancelled`] as soon as
    /// `cancel` fires, whatever the agent is doing.
    async fn sign_hash(
        &self,
        session: SigningSession,
        request: SignHashRequest,
        cancel: CancellationToken,
    ) -> Result<SignatureResult>;
}

/// HTTP client for a signer agent on `127.0.0.1`.
#[derive(Debug, Clone)]
pub struct SignerAgentClient {
    probe: reqwest::Client,
    sign: reqwest::Client,
    config: SignerConfig,
}

impl SignerAgentClient {
    pub fn new(config: SignerConfig) -> Result<Self> {
        let probe = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .connect_timeout(config.connect_timeout.min(config.probe_timeout))
            .no_proxy()
            .build()?;
        let sign = reqwest::Client::builder()
            .timeout(config.sign_timeout)
            .connect_timeout(config.connect_timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            probe,
            sign,
            config,
        })
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    fn map_transport(&self, e: reqwest::Error) -> SignerError {
        if e.is_timeout() {
            SignerError::NetworkTimeout {
                after: self.config.sign_timeout,
            }
        } else if e.is_connect() {
            SignerError::AgentUnavailable {
                port: self.config.agent_port,
            }
        } else {
            SignerError::Http(e)
        }
    }

    async fn exchange(
        &self,
        session: &SigningSession,
        request: &SignHashRequest,
    ) -> Result<SignResponse> {
        let response = self
            .sign
            .post(self.config.agent_url("/sign"))
            .bearer_auth(session.token())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SignerError::unauthorized(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;

        match serde_json::from_slice::<SignResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(SignerError::signing(format!(
                "agent returned HTTP {}",
                status.as_u16()
            ))),
            Err(e) => {
                tracing::warn!(error = %e, "agent returned a malformed sign response");
                Err(SignerError::signing(format!("malformed agent response: {}", e)))
            }
        }
    }
}

#[async_trait]
impl SignerAgent for SignerAgentClient {
    fn port(&self) -> u16 {
        self.config.agent_port
    }

    async fn check_availability(&self, session: &SigningSession) -> bool {
        let started = Instant::now();
        let probe = self
            .probe
            .get(self.config.agent_url("/status"))
            .bearer_auth(session.token())
            .send();

        let available = match tokio::time::timeout(self.config.probe_timeout, probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "agent probe failed");
                false
            }
            Err(_) => false,
        };

        tracing::debug!(
            port = self.config.agent_port,
            available,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probed signer agent"
        );
        available
    }

    async fn sign_hash(
        &self,
        session: SigningSession,
        request: SignHashRequest,
        cancel: CancellationToken,
    ) -> Result<SignatureResult> {
        if session.is_expired(Utc::now()) {
            return Err(SignerError::SessionExpired);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(document = %request.context.number, "signing cancelled by user");
                return Err(SignerError::Cancelled);
            }
            response = self.exchange(&session, &request) => response?,
        };

        response.into_result(&request.digest, Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use eyp_core::DocumentContext;
    use std::time::Duration;

    fn session(ttl_secs: i64) -> SigningSession {
        let now = Utc::now();
        SigningSession::new("token", now, now + ChronoDuration::seconds(ttl_secs))
    }

    fn request() -> SignHashRequest {
        SignHashRequest::new(
            "00".repeat(32),
            DocumentContext {
                number: "E-1".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
                subject: "Konu".into(),
                recipient: None,
            },
        )
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable_within_bound() {
        let client = SignerAgentClient::new(SignerConfig::default().with_agent_port(closed_port()))
            .unwrap();

        let started = Instant::now();
        assert!(!client.check_availability(&session(60)).await);
        assert!(started.elapsed() <= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_expired_session_fails_before_request() {
        let client = SignerAgentClient::new(SignerConfig::default().with_agent_port(closed_port()))
            .unwrap();

        let err = client
            .sign_hash(session(-1), request(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::SessionExpired));
    }

    #[tokio::test]
    async fn test_closed_port_sign_is_agent_unavailable() {
        let port = closed_port();
        let client = SignerAgentClient::new(SignerConfig::default().with_agent_port(port)).unwrap();

        let err = client
            .sign_hash(session(60), request(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::AgentUnavailable { port: p } if p == port));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_wins() {
        let client = SignerAgentClient::new(SignerConfig::default().with_agent_port(closed_port()))
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.sign_hash(session(60), request(), cancel).await.unwrap_err();
        assert!(matches!(err, SignerError::Cancelled));
    }
}
