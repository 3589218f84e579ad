//! Wire-level and shared type definitions.
//!
//! The parsed token tree of a request or response is a plain
//! [`serde_json::Value`]; the engine only traverses it and leaves
//! interpretation to the registered verifiers.

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, sync::Arc, time::Duration};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for the version field - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// JSON-RPC 2.0 request structure.
///
/// `jsonrpc` uses `Cow<'static, str>` so constructing with the static
/// version string allocates nothing; `id` is `Arc`'d so it can be echoed
/// into responses without a deep copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    pub params: serde_json::Value,
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION_COW,
            method: method.into(),
            params,
            id: Arc::new(serde_json::Value::from(id)),
        }
    }
}

/// JSON-RPC 2.0 response structure.
///
/// Exactly one of `result` / `error` is present in a conforming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Arc<serde_json::Value>,
    /// Chain-specific proof material accompanying the result, when the
    /// queried node was asked for one. Extension field; absent in plain
    /// JSON-RPC responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Raw per-URL outcome of one transport round.
///
/// The transport contract guarantees one `NodeResponse` per queried URL, in
/// the same order as the candidate list; an unreachable URL populates the
/// error side rather than being dropped.
#[derive(Debug, Clone)]
pub struct NodeResponse {
    /// Transport- or node-level error text, if the exchange failed.
    pub error: Option<String>,
    /// Raw response body on success.
    pub result: Option<String>,
    /// Elapsed wall time for this URL, used for weight updates.
    pub elapsed: Duration,
}

impl NodeResponse {
    #[must_use]
    pub fn ok(body: impl Into<String>, elapsed: Duration) -> Self {
        Self { error: None, result: Some(body.into()), elapsed }
    }

    #[must_use]
    pub fn err(message: impl Into<String>, elapsed: Duration) -> Self {
        Self { error: Some(message.into()), result: None, elapsed }
    }

    /// A synthetic response produced locally (by a verifier's `pre_handle`),
    /// never attributable to a network node.
    #[must_use]
    pub fn local(body: impl Into<String>) -> Self {
        Self { error: None, result: Some(body.into()), elapsed: Duration::ZERO }
    }
}

/// Requested proof strength for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProofLevel {
    /// No proof requested; results are trusted as-is.
    None,
    /// Merkle/trie proofs without historic headers.
    #[default]
    Standard,
    /// Full proofs including complete header chains.
    Full,
}

/// Payload serialization negotiated with a node.
///
/// Binary encoding is an alternate serialization of the same token tree; the
/// flag is carried to the transport, which sets the content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Binary,
}

/// Signature mode of the external signer contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// Sign the message bytes directly.
    Raw,
    /// Hash the message first, then sign the digest.
    Hash,
}

/// A fixed-length recoverable signature as returned by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

/// Error type for hash parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HashParseError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// 32-byte hash (block hashes, transaction hashes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&str> for Hash32 {
    type Error = HashParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let hex_str = value.strip_prefix("0x").ok_or(HashParseError::MissingPrefix)?;
        let bytes = hex::decode(hex_str).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(HashParseError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash32(arr))
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(arr: [u8; 32]) -> Self {
        Hash32(arr)
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Hash32 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// A block hash the client has already verified, cached on the chain so
/// later requests can anchor against it without re-verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedHash {
    pub block_number: u64,
    pub hash: Hash32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_wire_shape() {
        let req = JsonRpcRequest::new("eth_blockNumber", json!([]), 1);
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["method"], "eth_blockNumber");
        assert_eq!(wire["id"], 1);
    }

    #[test]
    fn response_roundtrip_with_proof() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":"0x10","proof":{"type":"blockProof"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.result, Some(json!("0x10")));
        assert!(resp.proof.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn hash32_parse_and_display() {
        let s = "0x0101010101010101010101010101010101010101010101010101010101010101";
        let h: Hash32 = s.parse().unwrap();
        assert_eq!(h.to_string(), s);
        assert_eq!(h.as_bytes()[0], 1);
    }

    #[test]
    fn hash32_rejects_bad_input() {
        assert!(matches!(Hash32::try_from("abcd"), Err(HashParseError::MissingPrefix)));
        assert!(matches!(Hash32::try_from("0xzz"), Err(HashParseError::InvalidHex(_))));
        assert!(matches!(Hash32::try_from("0xabcd"), Err(HashParseError::InvalidLength(2))));
    }

    #[test]
    fn node_response_constructors() {
        let ok = NodeResponse::ok("{}", Duration::from_millis(12));
        assert!(ok.error.is_none());
        let err = NodeResponse::err("connection refused", Duration::from_millis(5));
        assert!(err.result.is_none());
        let local = NodeResponse::local("{}");
        assert_eq!(local.elapsed, Duration::ZERO);
    }
}
