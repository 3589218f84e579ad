//! Client and per-request configuration.
//!
//! `ClientConfig` holds the client-wide defaults; every issued request takes
//! a [`RequestConfig`] snapshot of the verification-relevant fields, since
//! the client-wide configuration may be swapped between requests.

use crate::{
    error::ClientError,
    types::{Encoding, ProofLevel, VerifiedHash},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client-wide configuration.
///
/// Validated at client construction; invalid values return
/// [`ClientError::InvalidConfig`] rather than failing later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default chain id for requests that do not specify one.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Requested proof strength.
    #[serde(default)]
    pub proof: ProofLevel,

    /// Number of nodes queried per round (default: 1).
    #[serde(default = "default_request_count")]
    pub request_count: usize,

    /// Number of block-hash signatures requested from distinct nodes.
    #[serde(default)]
    pub signature_count: usize,

    /// Percentage of signature weight required before a block hash is
    /// accepted as final (0 disables the check).
    #[serde(default)]
    pub finality_percent: u8,

    /// Maximum rounds a request may reissue before failing permanently
    /// (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-round transport timeout in milliseconds (default: 10_000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Payload serialization negotiated with nodes.
    #[serde(default)]
    pub encoding: Encoding,

    /// Upper bound on verified block hashes cached per chain (default: 64).
    #[serde(default = "default_max_verified_hashes")]
    pub max_verified_hashes: usize,

    /// Initial blacklist duration for a misbehaving node, in seconds
    /// (default: 60). Doubles per repeated offense.
    #[serde(default = "default_blacklist_base_secs")]
    pub blacklist_base_secs: u64,

    /// Cap on the escalating blacklist duration, in seconds (default: 3600).
    #[serde(default = "default_blacklist_cap_secs")]
    pub blacklist_cap_secs: u64,

    /// Consecutive timeouts before a node is blacklisted instead of merely
    /// rotated to the back of the candidate list (default: 3).
    #[serde(default = "default_timeout_blacklist_threshold")]
    pub timeout_blacklist_threshold: u32,

    /// Seed for the selection RNG. `None` seeds from entropy; tests pin it.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_chain_id() -> u64 {
    1
}
fn default_request_count() -> usize {
    1
}
fn default_max_attempts() -> u32 {
    5
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_verified_hashes() -> usize {
    64
}
fn default_blacklist_base_secs() -> u64 {
    60
}
fn default_blacklist_cap_secs() -> u64 {
    3600
}
fn default_timeout_blacklist_threshold() -> u32 {
    3
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            proof: ProofLevel::default(),
            request_count: default_request_count(),
            signature_count: 0,
            finality_percent: 0,
            max_attempts: default_max_attempts(),
            timeout_ms: default_timeout_ms(),
            encoding: Encoding::default(),
            max_verified_hashes: default_max_verified_hashes(),
            blacklist_base_secs: default_blacklist_base_secs(),
            blacklist_cap_secs: default_blacklist_cap_secs(),
            timeout_blacklist_threshold: default_timeout_blacklist_threshold(),
            rng_seed: None,
        }
    }
}

impl ClientConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.request_count == 0 {
            return Err(ClientError::InvalidConfig("request_count must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ClientError::InvalidConfig("max_attempts must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::InvalidConfig("timeout_ms must be non-zero".into()));
        }
        if self.finality_percent > 100 {
            return Err(ClientError::InvalidConfig("finality_percent must be <= 100".into()));
        }
        if self.blacklist_cap_secs < self.blacklist_base_secs {
            return Err(ClientError::InvalidConfig(
                "blacklist_cap_secs must be >= blacklist_base_secs".into(),
            ));
        }
        Ok(())
    }

    /// Per-round transport timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-request snapshot of the verification parameters.
///
/// Batched calls carry one snapshot per sub-call; the copies are taken when
/// the request is issued so a concurrent config swap cannot change the
/// verification rules of an in-flight request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub chain_id: u64,
    pub proof: ProofLevel,
    /// Node addresses whose block-hash signatures were requested.
    pub signers: Vec<Vec<u8>>,
    pub finality_percent: u8,
    /// Block hashes verified before this request was issued.
    pub verified_hashes: Vec<VerifiedHash>,
}

impl RequestConfig {
    /// Takes a snapshot of the client-wide configuration for one sub-call.
    #[must_use]
    pub fn snapshot(config: &ClientConfig, verified_hashes: Vec<VerifiedHash>) -> Self {
        Self {
            chain_id: config.chain_id,
            proof: config.proof,
            signers: Vec::new(),
            finality_percent: config.finality_percent,
            verified_hashes,
        }
    }
}
