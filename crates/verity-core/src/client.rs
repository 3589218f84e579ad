//! The client: configuration, chain table, and the request driver.
//!
//! A [`Client`] owns everything a [`RequestContext`] needs to make progress:
//! the chain/node table with its weight records, the verifier registry, the
//! selection RNG, and the injected transport/signer/storage collaborators.
//! The context pulls these through `&Client` during [`RequestContext::execute`];
//! the async [`Client::send`] driver performs the transport exchanges in
//! between.

use crate::{
    chain::{Chain, ChainKind, Node, NodeProps},
    config::{ClientConfig, RequestConfig},
    error::ClientError,
    request::{ExecState, RequestContext, RequestKind},
    transport::{Signer, Storage, Transport},
    types::{Hash32, NodeResponse, VerifiedHash},
    verify::{TrustingVerifier, Verifier, VerifierRegistry},
};
use arc_swap::ArcSwap;
use dashmap::{
    mapref::one::{Ref, RefMut},
    DashMap,
};
use parking_lot::{Mutex, MutexGuard};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// A trust-minimized RPC client for one or more chains.
///
/// Cheap to share behind an `Arc`; all interior state is lock-protected at
/// fine granularity (per-chain entries in a concurrent map, the RNG behind
/// its own mutex, the configuration behind an atomic swap).
pub struct Client {
    config: ArcSwap<ClientConfig>,
    chains: DashMap<u64, Chain>,
    verifiers: VerifierRegistry,
    transport: Arc<dyn Transport>,
    signer: Option<Arc<dyn Signer>>,
    storage: Option<Arc<dyn Storage>>,
    rng: Mutex<StdRng>,
    next_id: AtomicU64,
}

impl Client {
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Current configuration snapshot. Holders keep the values they loaded
    /// even if the configuration is swapped concurrently.
    #[must_use]
    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.load_full()
    }

    /// Replaces the client-wide configuration. In-flight requests keep the
    /// [`RequestConfig`] snapshot they were issued with.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if the new configuration does
    /// not validate; the old one stays in place.
    pub fn update_config(&self, config: ClientConfig) -> Result<(), ClientError> {
        config.validate()?;
        info!(chain_id = config.chain_id, "configuration updated");
        self.config.store(Arc::new(config));
        Ok(())
    }

    pub(crate) fn verifiers(&self) -> &VerifierRegistry {
        &self.verifiers
    }

    /// The selection RNG. Held only for the duration of one selection.
    pub(crate) fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock()
    }

    /// Read access to a chain record.
    #[must_use]
    pub fn chain(&self, chain_id: u64) -> Option<Ref<'_, u64, Chain>> {
        self.chains.get(&chain_id)
    }

    fn chain_mut(&self, chain_id: u64) -> Option<RefMut<'_, u64, Chain>> {
        self.chains.get_mut(&chain_id)
    }

    /// Registers a chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyExists`] if the chain id is taken.
    pub fn register_chain(&self, chain: Chain) -> Result<(), ClientError> {
        let id = chain.id;
        if self.chains.contains_key(&id) {
            return Err(ClientError::AlreadyExists(format!("chain {id}")));
        }
        info!(chain = id, kind = ?chain.kind, "chain registered");
        self.chains.insert(id, chain);
        Ok(())
    }

    /// Adds a node to a registered chain.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain; otherwise whatever
    /// [`Chain::add_node`] reports.
    pub fn add_node(
        &self,
        chain_id: u64,
        address: Vec<u8>,
        url: Arc<str>,
        deposit: u64,
        capacity: u32,
        props: NodeProps,
    ) -> Result<usize, ClientError> {
        self.chain_mut(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?
            .add_node(address, url, deposit, capacity, props)
    }

    /// Removes a node from a registered chain by address.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain or address.
    pub fn remove_node(&self, chain_id: u64, address: &[u8]) -> Result<(), ClientError> {
        self.chain_mut(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?
            .remove_node(address)
    }

    /// Drops every node of a registered chain, weight records included.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain.
    pub fn clear_nodes(&self, chain_id: u64) -> Result<(), ClientError> {
        self.chain_mut(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?
            .clear_nodes();
        Ok(())
    }

    /// Replaces a chain's node list, carrying over weight history by address.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain.
    pub fn refresh_nodes(&self, chain_id: u64, nodes: Vec<Node>) -> Result<(), ClientError> {
        self.chain_mut(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?
            .refresh_nodes(nodes);
        Ok(())
    }

    pub(crate) fn note_response(&self, chain_id: u64, node_index: usize, elapsed: Duration) {
        if let Some(mut chain) = self.chain_mut(chain_id) {
            if let Some(weight) = chain.weight_mut(node_index) {
                weight.record_response(elapsed);
            }
        }
    }

    /// Records a transport timeout. The node is rotated to the back of
    /// future candidate lists; repeated streaks cross into a blacklist.
    pub(crate) fn note_timeout(&self, chain_id: u64, node_index: usize) {
        let config = self.config();
        if let Some(mut chain) = self.chain_mut(chain_id) {
            if let Some(weight) = chain.weight_mut(node_index) {
                if weight.record_timeout(config.timeout_blacklist_threshold) {
                    warn!(chain = chain_id, node = node_index, "timeout streak, blacklisting");
                    weight.blacklist(
                        Duration::from_secs(config.blacklist_base_secs),
                        Duration::from_secs(config.blacklist_cap_secs),
                    );
                }
            }
        }
    }

    /// Records node misbehavior (malformed body, failed proof): immediate
    /// blacklist with escalating backoff.
    pub(crate) fn note_misbehavior(&self, chain_id: u64, node_index: usize) {
        let config = self.config();
        if let Some(mut chain) = self.chain_mut(chain_id) {
            if let Some(weight) = chain.weight_mut(node_index) {
                weight.blacklist(
                    Duration::from_secs(config.blacklist_base_secs),
                    Duration::from_secs(config.blacklist_cap_secs),
                );
            }
        }
    }

    pub(crate) fn cache_verified_hashes(&self, chain_id: u64, hashes: &[VerifiedHash]) {
        if hashes.is_empty() {
            return;
        }
        let limit = self.config().max_verified_hashes;
        if let Some(mut chain) = self.chain_mut(chain_id) {
            chain.cache_verified_hashes(hashes, limit);
        }
    }

    /// Creates a context for a single call on the default chain.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if the default chain is not registered.
    pub fn new_request(
        &self,
        method: impl Into<String>,
        params: Value,
    ) -> Result<RequestContext, ClientError> {
        let chain_id = self.config().chain_id;
        self.new_child_context(&method.into(), params, chain_id)
    }

    /// Creates a context for a batched call; one verification snapshot per
    /// sub-call.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArg`] on an empty batch, [`ClientError::NotFound`]
    /// for an unregistered chain.
    pub fn new_batch(&self, calls: Vec<(String, Value)>) -> Result<RequestContext, ClientError> {
        if calls.is_empty() {
            return Err(ClientError::InvalidArg("empty batch".into()));
        }
        let config = self.config();
        let chain_id = config.chain_id;
        let hashes = self.snapshot_hashes(chain_id)?;
        let (requests, configs) = calls
            .into_iter()
            .map(|(method, params)| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                (
                    crate::types::JsonRpcRequest::new(method, params, id),
                    RequestConfig::snapshot(&config, hashes.clone()),
                )
            })
            .unzip();
        Ok(RequestContext::new_batch(requests, configs, chain_id))
    }

    /// Creates a context on an explicit chain; also the factory for required
    /// sub-requests demanded by verifiers.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if the chain is not registered.
    pub fn new_child_context(
        &self,
        method: &str,
        params: Value,
        chain_id: u64,
    ) -> Result<RequestContext, ClientError> {
        let hashes = self.snapshot_hashes(chain_id)?;
        let config = RequestConfig::snapshot(&self.config(), hashes);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = crate::types::JsonRpcRequest::new(method, params, id);
        Ok(RequestContext::new(request, config, chain_id))
    }

    fn snapshot_hashes(&self, chain_id: u64) -> Result<Vec<VerifiedHash>, ClientError> {
        let chain = self
            .chain(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?;
        Ok(chain.verified_hashes().to_vec())
    }

    /// Issues a call and drives it to completion.
    ///
    /// # Errors
    ///
    /// The context's terminal error, or a driver-level failure (no signer
    /// configured, unserializable payload).
    pub async fn send(
        &self,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Value, ClientError> {
        let mut ctx = self.new_request(method, params)?;
        match self.drive(&mut ctx).await? {
            ExecState::Success => Ok(ctx.result().cloned().unwrap_or(Value::Null)),
            _ => Err(ctx
                .error()
                .cloned()
                .unwrap_or_else(|| ClientError::Unknown("request ended without result".into()))),
        }
    }

    /// Blocking variant of [`Client::send`] for synchronous embeddings; spins
    /// up a single-threaded runtime per call.
    ///
    /// # Errors
    ///
    /// As [`Client::send`], plus runtime construction failures.
    pub fn send_blocking(
        &self,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Value, ClientError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientError::Unknown(format!("runtime: {e}")))?;
        runtime.block_on(self.send(method, params))
    }

    /// Drives a context until it reaches a terminal state, performing the
    /// transport/signer exchange at every suspension point.
    ///
    /// # Errors
    ///
    /// Driver-level failures only; verification and node errors end up in
    /// the context's terminal state instead.
    pub async fn drive(&self, ctx: &mut RequestContext) -> Result<ExecState, ClientError> {
        loop {
            match ctx.execute(self) {
                state if state.is_terminal() => return Ok(state),
                ExecState::WaitingForRequiredCtx => {
                    // The child was just attached; the next pass descends
                    // into it.
                }
                _ => self.exchange(ctx.pending_mut()).await?,
            }
        }
    }

    /// Performs the external exchange for one suspended context.
    async fn exchange(&self, ctx: &mut RequestContext) -> Result<(), ClientError> {
        match ctx.kind().clone() {
            RequestKind::Rpc => {
                let payload = ctx.request_payload()?;
                let urls = ctx.round_urls().to_vec();
                let config = self.config();
                debug!(method = ctx.method(), nodes = urls.len(), "dispatching round");
                let mut responses =
                    self.transport.send(&payload, &urls, config.timeout(), config.encoding).await;
                // One slot per URL is the transport contract; a short vector
                // counts as a failure for the missing slots.
                responses.resize_with(urls.len(), || {
                    NodeResponse::err("transport returned no response slot", Duration::ZERO)
                });
                ctx.set_responses(responses);
            }
            RequestKind::Sign { message, account, signature_kind } => {
                let signer = self
                    .signer
                    .as_ref()
                    .ok_or_else(|| ClientError::Unsupported("no signer configured".into()))?;
                // A refusal from the signer is a contract outcome, not a
                // driver failure: it goes terminal on the context like any
                // node-side error and propagates to the parent from there.
                match signer.sign(&message, &account, signature_kind).await {
                    Ok(signature) => ctx.set_responses(vec![NodeResponse::local(format!(
                        "0x{}",
                        hex::encode(signature.as_bytes())
                    ))]),
                    Err(e) => {
                        ctx.fail(ClientError::Signer(e));
                    }
                }
            }
        }
        Ok(())
    }

    /// Persists a chain's node list and verified-hash cache.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain,
    /// [`ClientError::Unsupported`] when no storage is configured.
    pub fn store_nodelist(&self, chain_id: u64) -> Result<(), ClientError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| ClientError::Unsupported("no storage configured".into()))?;
        let stored = {
            let chain = self
                .chain(chain_id)
                .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?;
            StoredChain::from_chain(&chain)
        };
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| ClientError::InvalidData(format!("nodelist serialization: {e}")))?;
        storage.set(&nodelist_key(chain_id), &bytes);
        debug!(chain = chain_id, nodes = stored.nodes.len(), "nodelist persisted");
        Ok(())
    }

    /// Restores a chain's node list from storage. Returns `false` on a
    /// storage miss, which means the caller must fetch a fresh list; a miss
    /// is never an error.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown chain,
    /// [`ClientError::Unsupported`] when no storage is configured,
    /// [`ClientError::InvalidData`] for a corrupt stored blob.
    pub fn load_nodelist(&self, chain_id: u64) -> Result<bool, ClientError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| ClientError::Unsupported("no storage configured".into()))?;
        let Some(bytes) = storage.get(&nodelist_key(chain_id)) else {
            return Ok(false);
        };
        let stored: StoredChain = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidData(format!("stored nodelist: {e}")))?;
        let limit = self.config().max_verified_hashes;
        let mut chain = self
            .chain_mut(chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {chain_id}")))?;
        let (nodes, hashes) = stored.into_parts()?;
        chain.refresh_nodes(nodes);
        chain.cache_verified_hashes(&hashes, limit);
        info!(chain = chain_id, nodes = chain.nodes().len(), "nodelist restored from storage");
        Ok(true)
    }
}

fn nodelist_key(chain_id: u64) -> String {
    format!("nodelist:{chain_id}")
}

/// Storage representation of a chain's node list. Addresses and hashes are
/// hex so the blob stays inspectable.
#[derive(Debug, Serialize, Deserialize)]
struct StoredChain {
    nodes: Vec<StoredNode>,
    verified_hashes: Vec<StoredHash>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    address: String,
    url: String,
    deposit: u64,
    capacity: u32,
    props: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredHash {
    block_number: u64,
    hash: String,
}

impl StoredChain {
    fn from_chain(chain: &Chain) -> Self {
        Self {
            nodes: chain
                .nodes()
                .iter()
                .map(|n| StoredNode {
                    address: hex::encode(&n.address),
                    url: n.url.to_string(),
                    deposit: n.deposit,
                    capacity: n.capacity,
                    props: n.props.bits(),
                })
                .collect(),
            verified_hashes: chain
                .verified_hashes()
                .iter()
                .map(|v| StoredHash { block_number: v.block_number, hash: v.hash.to_string() })
                .collect(),
        }
    }

    fn into_parts(self) -> Result<(Vec<Node>, Vec<VerifiedHash>), ClientError> {
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(index, n)| {
                Ok(Node {
                    address: hex::decode(&n.address)
                        .map_err(|e| ClientError::InvalidData(format!("stored address: {e}")))?,
                    url: n.url.into(),
                    deposit: n.deposit,
                    capacity: n.capacity,
                    props: NodeProps::from_bits_retain(n.props),
                    index,
                })
            })
            .collect::<Result<Vec<_>, ClientError>>()?;
        let hashes = self
            .verified_hashes
            .into_iter()
            .map(|v| {
                Ok(VerifiedHash {
                    block_number: v.block_number,
                    hash: Hash32::try_from(v.hash.as_str())
                        .map_err(|e| ClientError::InvalidData(format!("stored hash: {e}")))?,
                })
            })
            .collect::<Result<Vec<_>, ClientError>>()?;
        Ok((nodes, hashes))
    }
}

/// Step-by-step construction of a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
    storage: Option<Arc<dyn Storage>>,
    verifiers: VerifierRegistry,
}

impl ClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            signer: None,
            storage: None,
            verifiers: VerifierRegistry::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Registers the verifier for a chain kind.
    ///
    /// # Errors
    ///
    /// [`ClientError::AlreadyExists`] on a duplicate registration.
    pub fn verifier(
        mut self,
        kind: ChainKind,
        verifier: Arc<dyn Verifier>,
    ) -> Result<Self, ClientError> {
        self.verifiers.register(kind, verifier)?;
        Ok(self)
    }

    /// Registers [`TrustingVerifier`] for every chain kind that has none
    /// yet. Only appropriate for `ProofLevel::None` setups and tests.
    #[must_use]
    pub fn trusting(mut self) -> Self {
        for kind in
            [ChainKind::Ethereum, ChainKind::Bitcoin, ChainKind::Substrate, ChainKind::Ipfs]
        {
            // Already-registered kinds keep their verifier.
            let _ = self.verifiers.register(kind, Arc::new(TrustingVerifier));
        }
        self
    }

    /// Finalizes the client.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidConfig`] for a bad configuration or a missing
    /// transport.
    pub fn build(self) -> Result<Client, ClientError> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| ClientError::InvalidConfig("a transport is required".into()))?;
        let rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(chain_id = self.config.chain_id, "client built");
        Ok(Client {
            config: ArcSwap::from_pointee(self.config),
            chains: DashMap::new(),
            verifiers: self.verifiers,
            transport,
            signer: self.signer,
            storage: self.storage,
            rng: Mutex::new(rng),
            next_id: AtomicU64::new(1),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryStorage;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(
            &self,
            _payload: &str,
            urls: &[Arc<str>],
            _timeout: Duration,
            _encoding: crate::types::Encoding,
        ) -> Vec<NodeResponse> {
            urls.iter().map(|_| NodeResponse::err("unreachable", Duration::ZERO)).collect()
        }
    }

    fn client() -> Client {
        Client::builder()
            .transport(Arc::new(NullTransport))
            .storage(Arc::new(MemoryStorage::new()))
            .trusting()
            .build()
            .unwrap()
    }

    fn seed_chain(client: &Client) {
        client.register_chain(Chain::new(1, ChainKind::Ethereum)).unwrap();
        client
            .add_node(1, vec![1; 20], "https://a.example.com".into(), 1000, 10, NodeProps::PROOF)
            .unwrap();
        client
            .add_node(1, vec![2; 20], "https://b.example.com".into(), 1000, 10, NodeProps::PROOF)
            .unwrap();
    }

    #[test]
    fn build_requires_transport() {
        let err = Client::builder().build();
        assert!(matches!(err, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn duplicate_chain_rejected() {
        let client = client();
        client.register_chain(Chain::new(1, ChainKind::Ethereum)).unwrap();
        let dup = client.register_chain(Chain::new(1, ChainKind::Ethereum));
        assert!(matches!(dup, Err(ClientError::AlreadyExists(_))));
    }

    #[test]
    fn update_config_validates_before_swapping() {
        let client = client();
        let bad = ClientConfig { request_count: 0, ..ClientConfig::default() };
        assert!(client.update_config(bad).is_err());
        assert_eq!(client.config().request_count, 1);

        let good = ClientConfig { request_count: 3, ..ClientConfig::default() };
        client.update_config(good).unwrap();
        assert_eq!(client.config().request_count, 3);
    }

    #[test]
    fn misbehavior_blacklists_immediately() {
        let client = client();
        seed_chain(&client);
        client.note_misbehavior(1, 0);
        let chain = client.chain(1).unwrap();
        assert!(chain.weights()[0].is_blacklisted(std::time::Instant::now()));
        assert!(!chain.weights()[1].is_blacklisted(std::time::Instant::now()));
    }

    #[test]
    fn timeouts_blacklist_only_past_the_threshold() {
        let client = client();
        seed_chain(&client);
        client.note_timeout(1, 0);
        client.note_timeout(1, 0);
        assert!(!client.chain(1).unwrap().weights()[0].is_blacklisted(std::time::Instant::now()));
        client.note_timeout(1, 0);
        assert!(client.chain(1).unwrap().weights()[0].is_blacklisted(std::time::Instant::now()));
    }

    #[test]
    fn nodelist_roundtrips_through_storage() {
        let client = client();
        seed_chain(&client);
        client.cache_verified_hashes(
            1,
            &[VerifiedHash { block_number: 7, hash: Hash32([7; 32]) }],
        );
        client.store_nodelist(1).unwrap();

        client.clear_nodes(1).unwrap();
        assert!(client.load_nodelist(1).unwrap());

        let chain = client.chain(1).unwrap();
        assert_eq!(chain.nodes().len(), 2);
        assert_eq!(chain.nodes()[1].address, vec![2; 20]);
        assert_eq!(chain.verified_hash(7), Some(Hash32([7; 32])));
    }

    #[test]
    fn load_miss_means_refetch_not_error() {
        let client = client();
        client.register_chain(Chain::new(5, ChainKind::Ethereum)).unwrap();
        assert!(!client.load_nodelist(5).unwrap());
    }

    #[test]
    fn new_request_snapshots_verified_hashes() {
        let client = client();
        seed_chain(&client);
        client.cache_verified_hashes(
            1,
            &[VerifiedHash { block_number: 3, hash: Hash32([3; 32]) }],
        );
        let ctx = client.new_request("eth_blockNumber", serde_json::json!([])).unwrap();
        assert_eq!(ctx.chain_id(), 1);
        assert_eq!(ctx.method(), "eth_blockNumber");
    }

    #[test]
    fn new_request_fails_for_unknown_chain() {
        let client = client();
        let err = client.new_request("eth_blockNumber", serde_json::json!([]));
        assert!(matches!(err, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn send_exhausts_attempts_against_dead_nodes() {
        let config = ClientConfig { max_attempts: 2, rng_seed: Some(7), ..ClientConfig::default() };
        let client = Client::builder()
            .config(config)
            .transport(Arc::new(NullTransport))
            .trusting()
            .build()
            .unwrap();
        seed_chain(&client);

        let err = client.send("eth_blockNumber", serde_json::json!([])).await;
        assert!(matches!(err, Err(ClientError::NoResponse(_))));
    }
}
