//! Trust-minimized JSON-RPC client engine.
//!
//! The crate turns "call a blockchain RPC method" into "call it against a
//! weighted selection of third-party nodes and cryptographically verify the
//! answer before handing it over". The three moving parts:
//!
//! - [`request::RequestContext`] — a cooperative state machine for one
//!   logical call. `execute` never blocks; it suspends whenever an external
//!   exchange is due and the driver feeds responses back in.
//! - [`select`] — weighted random node selection over per-node performance
//!   records, with rotation for slow nodes and escalating blacklists for
//!   misbehaving ones.
//! - [`verify`] — pluggable per-chain-kind verifiers that can accept a
//!   response, reject its proof, or demand more data as a required
//!   sub-request.
//!
//! [`client::Client`] wires these together with injected transport, signer,
//! and storage collaborators; see [`Client::send`] for the all-in-one async
//! entry point and [`RequestContext::execute`] for caller-driven embeddings.
//!
//! [`Client::send`]: client::Client::send
//! [`RequestContext::execute`]: request::RequestContext::execute

pub mod cache_list;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod select;
pub mod transport;
pub mod types;
pub mod verify;
pub mod weights;

pub use chain::{Chain, ChainKind, Node, NodeProps, Whitelist};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, RequestConfig};
pub use error::{ClientError, SignerError};
pub use request::{ExecState, RequestContext, RequestKind};
pub use select::{NodeMatch, SelectionParams};
pub use transport::{MemoryStorage, Signer, Storage, Transport};
pub use types::{
    Encoding, Hash32, JsonRpcError, JsonRpcRequest, JsonRpcResponse, NodeResponse, ProofLevel,
    Signature, SignatureKind, VerifiedHash,
};
pub use verify::{
    TrustingVerifier, VerificationContext, Verifier, VerifierRegistry, VerifyOutcome,
};
