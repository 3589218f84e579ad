use thiserror::Error;

/// Errors produced by the client engine.
///
/// This is a closed taxonomy: node-level failures (bad proof, malformed
/// response, unreachable endpoint) are absorbed into blacklist and retry
/// decisions inside the execution loop and only surface once every available
/// node has been exhausted, carrying the last informative message. A failure
/// of a required sub-request propagates to its parent verbatim, so the
/// ultimate caller always sees the root cause.
///
/// "Waiting" is deliberately *not* part of this enum — cooperative yields are
/// reported through [`crate::request::ExecState`], never as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    /// Unclassified failure.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// An internal buffer or table hit its configured capacity.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// The operation is not supported by this client or chain kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A caller-supplied argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A chain, node, verifier, or cache entry was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Client configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configured limit (attempts, nodes, cache size) was reached.
    #[error("limit reached: {0}")]
    LimitReached(String),

    /// Protocol or nodelist version mismatch.
    #[error("version mismatch: {0}")]
    VersionMismatch(String),

    /// Response or proof data was structurally invalid or incomplete.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A signature or credential check failed.
    #[error("wrong credential: {0}")]
    WrongCredential(String),

    /// A remote node reported a JSON-RPC error payload.
    #[error("remote error: {0}")]
    RemoteError(String),

    /// A remote node delivered no usable response at all.
    #[error("no response from node: {0}")]
    NoResponse(String),

    /// A node URL could not be parsed or reached at the protocol level.
    #[error("malformed endpoint: {0}")]
    MalformedEndpoint(String),

    /// The transport layer failed before any node could answer.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A numeric value fell outside its permitted range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The entity being registered already exists (duplicate verifier,
    /// conflicting required sub-request, re-registered chain).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No node passed capability, whitelist, and blacklist filtering.
    #[error("no eligible nodes: {0}")]
    NoEligibleNodes(String),

    /// Signing was rejected or failed; see [`SignerError`].
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

impl ClientError {
    /// Returns `true` if this error is transient and the request may succeed
    /// on a different node or a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure(_) |
                Self::NoResponse(_) |
                Self::RemoteError(_) |
                Self::LimitReached(_)
        )
    }

    /// Returns `true` if this error should count against the responding
    /// node's weight record.
    ///
    /// Caller mistakes (bad arguments, configuration) never penalize a node;
    /// malformed data, bad proofs, and empty responses do.
    #[must_use]
    pub fn should_penalize_node(&self) -> bool {
        matches!(
            self,
            Self::InvalidData(_) |
                Self::WrongCredential(_) |
                Self::NoResponse(_) |
                Self::MalformedEndpoint(_)
        )
    }
}

/// The fixed error set of the external signer contract.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerError {
    /// The signer refused to sign the message.
    #[error("signing rejected")]
    Rejected,
    /// The requested account is not managed by this signer.
    #[error("account not found")]
    AccountNotFound,
    /// The message could not be interpreted for the requested mode.
    #[error("invalid message")]
    InvalidMessage,
    /// Any other signer-side failure.
    #[error("general signer error")]
    General,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ClientError::TransportFailure("dns".into()).is_transient());
        assert!(ClientError::NoResponse("node-1".into()).is_transient());
        assert!(ClientError::RemoteError("busy".into()).is_transient());

        assert!(!ClientError::InvalidArg("bad".into()).is_transient());
        assert!(!ClientError::InvalidConfig("bad".into()).is_transient());
        assert!(!ClientError::WrongCredential("sig".into()).is_transient());
    }

    #[test]
    fn penalty_classification() {
        assert!(ClientError::InvalidData("truncated proof".into()).should_penalize_node());
        assert!(ClientError::WrongCredential("bad sig".into()).should_penalize_node());
        assert!(ClientError::NoResponse("node-2".into()).should_penalize_node());

        assert!(!ClientError::InvalidArg("caller bug".into()).should_penalize_node());
        assert!(!ClientError::NotFound("chain 5".into()).should_penalize_node());
    }

    #[test]
    fn signer_error_converts() {
        let err: ClientError = SignerError::AccountNotFound.into();
        assert_eq!(err, ClientError::Signer(SignerError::AccountNotFound));
    }
}
