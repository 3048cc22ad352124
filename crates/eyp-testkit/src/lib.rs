//! # EYP Testkit
//!
//! Testing utilities for EYP.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known digests of fixed inputs and of one fixed package
//! - **Generators**: Proptest strategies for metadata, covers and attachments
//! - **Fixtures**: Ready-made metadata, packages and a memory store
//! - **Inspection**: Test-only parsers for containers and metadata documents
//! - **Stubs**: Loopback HTTP stand-ins for the signer agent and the session authority
//!
//! ## Golden Vectors
//!
//! ```rust
//! use eyp_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use eyp_testkit::generators::PackageParams;
//!
//! proptest! {
//!     #[test]
//!     fn build_is_deterministic(params: PackageParams) {
//!         prop_assert_eq!(params.build().unwrap().bytes, params.build().unwrap().bytes);
//!     }
//! }
//! ```
//!
//! ## Stub Agent
//!
//! ```rust,no_run
//! use eyp_testkit::stub::{AgentBehaviour, StubAgent};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let agent = StubAgent::start(AgentBehaviour::SignRequested).await?;
//! println!("agent listening on port {}", agent.port());
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod inspect;
pub mod stub;
pub mod vectors;

pub use fixtures::{sample_metadata, TestFixture};
pub use generators::PackageParams;
pub use inspect::{parse_container, parse_metadata, ParsedContainer, ParsedEntry, ParsedMetadata};
pub use stub::{closed_port, AgentBehaviour, AuthorityMode, StubAgent, StubAuthority};
pub use vectors::{all_vectors, verify_all_vectors, DigestVector};
