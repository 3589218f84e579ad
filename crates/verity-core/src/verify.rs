//! Verifier dispatch.
//!
//! The engine never interprets chain-specific proofs itself: every response
//! is handed to the [`Verifier`] registered for the chain's kind. A verifier
//! may accept the response, reject the proof (which the engine treats as
//! node misbehavior), or demand more data, which the engine satisfies by
//! attaching a required sub-request to the context.

use crate::{
    chain::{Chain, ChainKind},
    config::RequestConfig,
    error::ClientError,
    request::RequestContext,
    types::{JsonRpcRequest, VerifiedHash},
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

/// Outcome of one `verify` call.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The response is cryptographically sound. Any block hashes proven
    /// along the way are cached on the chain for later requests.
    Valid { verified_hashes: Vec<VerifiedHash> },
    /// Verification cannot proceed without another piece of data (a nodelist
    /// update, a signature); the engine issues it as a required sub-request.
    NeedsData { method: String, params: Value },
    /// The proof is wrong. The responding node is misbehaving and will be
    /// blacklisted; the request is retried elsewhere while budget remains.
    InvalidProof { reason: String },
}

/// Transient view passed by reference into a verifier call; it outlives only
/// that call.
///
/// `result` and `proof` are detached copies of the response tree so the
/// verifier can freely borrow the context (for its scratch cache and for
/// probing required sub-requests) at the same time.
pub struct VerificationContext<'a> {
    pub chain_id: u64,
    pub chain_kind: ChainKind,
    /// Verification parameters snapshotted when the request was issued.
    pub config: RequestConfig,
    /// Parsed result of the sub-call under verification.
    pub result: Value,
    /// Parsed proof material, if the node supplied any.
    pub proof: Option<Value>,
    /// The context being verified; gives access to the scratch cache and the
    /// resolved required sub-request, if one was previously demanded.
    pub ctx: &'a mut RequestContext,
}

/// A chain-family verification module.
///
/// `verify` must be idempotent: calling it twice on the same
/// [`VerificationContext`] yields the same outcome.
pub trait Verifier: Send + Sync {
    /// Invoked before any network round-trip; may answer the request
    /// entirely from local state (e.g. an already-cached hash), in which
    /// case no node is consulted.
    fn pre_handle(
        &self,
        _request: &JsonRpcRequest,
        _chain: &Chain,
    ) -> Result<Option<Value>, ClientError> {
        Ok(None)
    }

    /// Checks a response against its proof.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal failures (bad arguments, corrupt
    /// scratch state); a failed proof is reported through
    /// [`VerifyOutcome::InvalidProof`], not as an error.
    fn verify(&self, vctx: &mut VerificationContext<'_>) -> Result<VerifyOutcome, ClientError>;
}

/// Per-client table mapping a chain kind to its verification module.
///
/// Populated by explicit registration at construction; there is no
/// process-global state.
#[derive(Default, Clone)]
pub struct VerifierRegistry {
    verifiers: HashMap<ChainKind, Arc<dyn Verifier>>,
}

impl VerifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verifier for a chain kind.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyExists`] on a duplicate registration;
    /// a kind's verifier is fixed for the client's lifetime.
    pub fn register(
        &mut self,
        kind: ChainKind,
        verifier: Arc<dyn Verifier>,
    ) -> Result<(), ClientError> {
        if self.verifiers.contains_key(&kind) {
            return Err(ClientError::AlreadyExists(format!("verifier for {kind:?}")));
        }
        self.verifiers.insert(kind, verifier);
        Ok(())
    }

    /// Looks up the verifier for a chain kind.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unsupported`] if no verifier was registered.
    pub fn get(&self, kind: ChainKind) -> Result<Arc<dyn Verifier>, ClientError> {
        self.verifiers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ClientError::Unsupported(format!("no verifier for {kind:?}")))
    }
}

/// Accepts every response without proof checks.
///
/// The right verifier for `ProofLevel::None` setups and the baseline for
/// tests; real chain modules replace it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustingVerifier;

impl Verifier for TrustingVerifier {
    fn verify(&self, _vctx: &mut VerificationContext<'_>) -> Result<VerifyOutcome, ClientError> {
        Ok(VerifyOutcome::Valid { verified_hashes: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = VerifierRegistry::new();
        registry.register(ChainKind::Ethereum, Arc::new(TrustingVerifier)).unwrap();
        let dup = registry.register(ChainKind::Ethereum, Arc::new(TrustingVerifier));
        assert!(matches!(dup, Err(ClientError::AlreadyExists(_))));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = VerifierRegistry::new();
        registry.register(ChainKind::Bitcoin, Arc::new(TrustingVerifier)).unwrap();
        assert!(registry.get(ChainKind::Bitcoin).is_ok());
        assert!(matches!(
            registry.get(ChainKind::Ipfs),
            Err(ClientError::Unsupported(_))
        ));
    }
}
