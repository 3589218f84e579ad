//! Chain records and their node lists.
//!
//! A [`Chain`] owns its node list and the parallel [`NodeWeight`] records.
//! Node identity within a chain is the stable `index`; mutation happens only
//! through the explicit add/remove/refresh operations, which preserve weight
//! history for nodes that persist across a nodelist update.

use crate::{
    error::ClientError,
    types::{Hash32, VerifiedHash},
    weights::NodeWeight,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Supported chain families; selects the registered verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Ethereum,
    Bitcoin,
    Substrate,
    Ipfs,
}

bitflags! {
    /// Capability bits advertised by a node.
    ///
    /// The low 32 bits are capability flags; the high 32 bits carry the
    /// minimum block height the node retains, reachable through the typed
    /// [`NodeProps::min_block_height`] accessor rather than raw shifts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NodeProps: u64 {
        /// Can deliver Merkle/trie proofs.
        const PROOF = 0x1;
        /// Serves several chains behind one endpoint.
        const MULTICHAIN = 0x2;
        /// Keeps full archive state.
        const ARCHIVE = 0x4;
        /// Reachable over plain HTTP.
        const HTTP = 0x8;
        /// Accepts the binary payload encoding.
        const BINARY = 0x10;
        /// Reachable as an onion service.
        const ONION = 0x20;
        /// Provides block-hash signatures.
        const SIGNER = 0x40;
        /// Stores and serves arbitrary data blobs.
        const DATA = 0x80;
        /// Exposes usage statistics.
        const STATS = 0x100;

        const _ = !0;
    }
}

impl Default for NodeProps {
    /// No capability required, no height constraint.
    fn default() -> Self {
        Self::empty()
    }
}

impl NodeProps {
    /// Minimum block height retained by the node (0 = everything).
    #[must_use]
    pub fn min_block_height(self) -> u64 {
        self.bits() >> 32
    }

    /// Returns a copy with the minimum block height set.
    #[must_use]
    pub fn with_min_block_height(self, height: u64) -> Self {
        let low = self.bits() & 0xFFFF_FFFF;
        Self::from_bits_retain(low | (height << 32))
    }

    /// Capability check ignoring the height bits.
    #[must_use]
    pub fn supports(self, required: NodeProps) -> bool {
        let caps = Self::from_bits_retain(self.bits() & 0xFFFF_FFFF);
        caps.contains(Self::from_bits_retain(required.bits() & 0xFFFF_FFFF))
    }
}

/// A third-party server offering RPC access to a chain.
///
/// Immutable once added except through the chain's explicit node-list
/// operations; `index` is stable within its chain.
#[derive(Debug, Clone)]
pub struct Node {
    /// On-chain address identifying the node operator.
    pub address: Vec<u8>,
    /// RPC endpoint URL.
    pub url: Arc<str>,
    /// Stake deposited in the registry contract.
    pub deposit: u64,
    /// Advertised request capacity.
    pub capacity: u32,
    /// Capability bitmask.
    pub props: NodeProps,
    /// Stable position within the chain's node list.
    pub index: usize,
}

/// Chain-governed restriction on which node addresses may be selected.
#[derive(Debug, Clone)]
pub struct Whitelist {
    pub addresses: Vec<Vec<u8>>,
    /// Block at which the whitelist contract was last read.
    pub last_update_block: u64,
    /// When this copy was fetched; stale copies are ignored by selection.
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    /// Maximum age before the copy is considered stale.
    pub max_age: chrono::Duration,
}

impl Whitelist {
    /// A whitelist older than `max_age` no longer constrains selection;
    /// restricting candidates based on outdated governance data would be
    /// worse than falling back to the full node list.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        chrono::Utc::now() - self.fetched_at > self.max_age
    }

    #[must_use]
    pub fn permits(&self, address: &[u8]) -> bool {
        self.addresses.iter().any(|a| a == address)
    }
}

/// Metadata about the last observed nodelist change, used to decide when a
/// nodelist refresh sub-request is due.
#[derive(Debug, Clone, Copy)]
pub struct NodelistUpdate {
    /// Block in which the registry reported the change.
    pub block: u64,
    /// Registry-reported timestamp of the change.
    pub timestamp: u64,
}

/// One chain known to the client.
#[derive(Debug)]
pub struct Chain {
    pub id: u64,
    pub kind: ChainKind,
    /// Address of the node-registry contract, if the chain has one.
    pub registry_contract: Option<Vec<u8>>,
    nodes: Vec<Node>,
    weights: Vec<NodeWeight>,
    pub whitelist: Option<Whitelist>,
    verified_hashes: Vec<VerifiedHash>,
    pub pending_update: Option<NodelistUpdate>,
}

impl Chain {
    #[must_use]
    pub fn new(id: u64, kind: ChainKind) -> Self {
        Self {
            id,
            kind,
            registry_contract: None,
            nodes: Vec::new(),
            weights: Vec::new(),
            whitelist: None,
            verified_hashes: Vec::new(),
            pending_update: None,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn weights(&self) -> &[NodeWeight] {
        &self.weights
    }

    #[must_use]
    pub fn weight_mut(&mut self, node_index: usize) -> Option<&mut NodeWeight> {
        self.weights.get_mut(node_index)
    }

    #[must_use]
    pub fn node(&self, node_index: usize) -> Option<&Node> {
        self.nodes.get(node_index)
    }

    /// Appends a node, assigning it the next stable index.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyExists`] if a node with the same
    /// address is present.
    pub fn add_node(
        &mut self,
        address: Vec<u8>,
        url: Arc<str>,
        deposit: u64,
        capacity: u32,
        props: NodeProps,
    ) -> Result<usize, ClientError> {
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::MalformedEndpoint(url.to_string()));
        }
        if self.nodes.iter().any(|n| n.address == address) {
            return Err(ClientError::AlreadyExists(format!(
                "node 0x{} already registered",
                hex::encode(&address)
            )));
        }
        let index = self.nodes.len();
        self.nodes.push(Node { address, url, deposit, capacity, props, index });
        self.weights.push(NodeWeight::default());
        debug!(chain = self.id, index, "node added");
        Ok(index)
    }

    /// Removes a node by address, compacting indices.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if no node has that address.
    pub fn remove_node(&mut self, address: &[u8]) -> Result<(), ClientError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.address == address)
            .ok_or_else(|| ClientError::NotFound(format!("node 0x{}", hex::encode(address))))?;
        self.nodes.remove(pos);
        self.weights.remove(pos);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.index = i;
        }
        debug!(chain = self.id, "node removed");
        Ok(())
    }

    /// Drops every node and its weight record.
    pub fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.weights.clear();
    }

    /// Replaces the node list with a freshly fetched one, carrying over the
    /// weight record of every node that persists (matched by address).
    /// Discarding weight history on refresh would defeat the selection
    /// algorithm, so replacement is by address, not wholesale.
    pub fn refresh_nodes(&mut self, mut new_nodes: Vec<Node>) {
        let mut new_weights = Vec::with_capacity(new_nodes.len());
        for (i, node) in new_nodes.iter_mut().enumerate() {
            node.index = i;
            let carried = self
                .nodes
                .iter()
                .position(|old| old.address == node.address)
                .map(|pos| self.weights[pos].clone());
            new_weights.push(carried.unwrap_or_default());
        }
        debug!(
            chain = self.id,
            old = self.nodes.len(),
            new = new_nodes.len(),
            "nodelist refreshed"
        );
        self.nodes = new_nodes;
        self.weights = new_weights;
        self.pending_update = None;
    }

    /// Verified block hashes cached on this chain, newest last.
    #[must_use]
    pub fn verified_hashes(&self) -> &[VerifiedHash] {
        &self.verified_hashes
    }

    #[must_use]
    pub fn verified_hash(&self, block_number: u64) -> Option<Hash32> {
        self.verified_hashes
            .iter()
            .find(|v| v.block_number == block_number)
            .map(|v| v.hash)
    }

    /// Caches newly verified hashes, bounded by `limit` (oldest evicted).
    pub fn cache_verified_hashes(&mut self, hashes: &[VerifiedHash], limit: usize) {
        for vh in hashes {
            if let Some(existing) =
                self.verified_hashes.iter_mut().find(|v| v.block_number == vh.block_number)
            {
                existing.hash = vh.hash;
            } else {
                self.verified_hashes.push(*vh);
            }
        }
        if self.verified_hashes.len() > limit {
            let excess = self.verified_hashes.len() - limit;
            self.verified_hashes.drain(..excess);
        }
    }
}
