//! Signing pipeline configuration.

use std::time::Duration;

/// Default loopback port of the signing application.
pub const DEFAULT_AGENT_PORT: u16 = 8099;

/// Default session endpoint of the backend authority.
pub const DEFAULT_SESSION_ENDPOINT: &str = "http://127.0.0.1:8080/session";

/// Configuration for the session broker and signer agent client.
///
/// The agent is always addressed on `127.0.0.1`; only the port varies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// Loopback port of the signing application.
    pub agent_port: u16,

    /// Upper bound for an availability probe.
    pub probe_timeout: Duration,

    /// Upper bound for establishing a loopback connection.
    pub connect_timeout: Duration,

    /// Upper bound for one sign call, human PIN entry included.
    pub sign_timeout: Duration,

    /// Where signing sessions are requested.
    pub session_endpoint: String,

    /// Bearer credential presented to the session endpoint, if any.
    pub backend_credential: Option<String>,

    /// Upper bound for one session request.
    pub session_timeout: Duration,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            agent_port: DEFAULT_AGENT_PORT,
            probe_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(2),
            sign_timeout: Duration::from_secs(300),
            session_endpoint: DEFAULT_SESSION_ENDPOINT.to_string(),
            backend_credential: None,
            session_timeout: Duration::from_secs(10),
        }
    }
}

impl SignerConfig {
    pub fn with_agent_port(mut self, port: u16) -> Self {
        self.agent_port = port;
        self
    }

    pub fn with_session_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.session_endpoint = endpoint.into();
        self
    }

    pub fn with_backend_credential(mut self, credential: impl Into<String>) -> Self {
        self.backend_credential = Some(credential.into());
        self
    }

    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Loopback URL of an agent route, e.g. `agent_url("/sign")`.
    pub fn agent_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.agent_port, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SignerConfig::default();
        assert_eq!(config.agent_port, 8099);
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
        assert!(config.sign_timeout > config.probe_timeout);
        assert_eq!(config.agent_url("/status"), "http://127.0.0.1:8099/status");
    }

    #[test]
    fn test_builder_overrides() {
        let config = SignerConfig::default()
            .with_agent_port(9100)
            .with_sign_timeout(Duration::from_secs(5));
        assert_eq!(config.agent_url("/sign"), "http://127.0.0.1:9100/sign");
        assert_eq!(config.sign_timeout, Duration::from_secs(5));
    }
}
