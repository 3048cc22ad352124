//! Service configuration.

use std::time::Duration;

use eyp_signer::SignerConfig;

/// Configuration for [`EypService`](crate::EypService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EypConfig {
    /// Session broker and signer agent settings.
    pub signer: SignerConfig,

    /// Upper bound for fetching one attachment. A fetch that takes longer
    /// is dropped like any other failed attachment.
    pub attachment_timeout: Duration,
}

impl Default for EypConfig {
    fn default() -> Self {
        Self {
            signer: SignerConfig::default(),
            attachment_timeout: Duration::from_secs(30),
        }
    }
}

impl EypConfig {
    pub fn with_signer(mut self, signer: SignerConfig) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_attachment_timeout(mut self, timeout: Duration) -> Self {
        self.attachment_timeout = timeout;
        self
    }
}
