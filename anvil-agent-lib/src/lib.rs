//! Shared library for the Anvil build agent.
//!
//! This crate provides the two protocol pieces the agent binary composes:
//! - Trust-on-first-use bootstrap against the build-coordination server
//!   (certificate probe, plaintext registration, mutual-TLS client)
//! - Artifact packaging and upload (zip archive + checksum manifest,
//!   multipart delivery, failure classification)
//!
//! Everything runs blocking and single-threaded; the caller owns any
//! timeout or retry policy.

mod bootstrap;
mod certs;
mod config;
mod error;
mod identity;
mod uploader;

#[cfg(test)]
pub(crate) mod testutil;

pub use bootstrap::{Registration, TrustBootstrap};
pub use certs::{CertStore, TrustMaterial};
pub use config::ServerConfig;
pub use error::Error;
pub use identity::AgentIdentity;
pub use uploader::Uploader;

pub type Result<T, E = Error> = std::result::Result<T, E>;
