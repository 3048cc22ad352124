//! # EYP Signer
//!
//! Coordinates signing a package through a locally running signing
//! application (the signer agent).
//!
//! ## Overview
//!
//! A signing attempt:
//!
//! 1. Obtains a single-use [`SigningSession`] from a [`SessionBroker`]
//! 2. Probes the agent on its loopback port
//! 3. Sends the cover digest and a human-readable [`DocumentContext`],
//!    then waits while the user enters a PIN
//!
//! [`run_attempt`] drives these steps through [`AttemptState`] and returns
//! the [`SignatureResult`] only when the attempt ends in `Signed`.
//! Validating that result against the stored package is not done here;
//! see [`eyp_core::status`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eyp_signer::{run_attempt, HttpSessionBroker, SignHashRequest, SignerAgentClient, SignerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(request: SignHashRequest) -> eyp_signer::Result<()> {
//! let config = SignerConfig::default();
//! let broker = HttpSessionBroker::new(&config)?;
//! let agent = SignerAgentClient::new(config)?;
//!
//! let outcome = run_attempt(&broker, &agent, request, CancellationToken::new()).await;
//! if let Some(hint) = outcome.hint() {
//!     eprintln!("{}", hint);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`DocumentContext`]: eyp_core::DocumentContext
//! [`SignatureResult`]: eyp_core::SignatureResult

pub mod agent;
pub mod attempt;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;

pub use agent::{SignerAgent, SignerAgentClient};
pub use attempt::{run_attempt, AttemptOutcome, AttemptState};
pub use config::{SignerConfig, DEFAULT_AGENT_PORT, DEFAULT_SESSION_ENDPOINT};
pub use error::{Result, SignerError};
pub use messages::{SignHashRequest, SignResponse, CODE_CANCELLED, CODE_DECLINED};
pub use session::{HttpSessionBroker, SessionBroker, SigningSession};
