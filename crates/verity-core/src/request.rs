//! The request execution engine.
//!
//! A [`RequestContext`] owns one logical RPC call (or batch): its chosen
//! candidate nodes, the raw per-node responses, and at most one outstanding
//! required sub-context. Execution is cooperative: [`RequestContext::execute`]
//! never blocks — it returns [`ExecState::WaitingForResponse`] at its single
//! suspension point and the caller performs the transport exchange before
//! re-entering. A synchronous or async driver is just a loop around this.
//!
//! Ownership doubles as the cleanup contract: dropping a context drops its
//! required child first, then the scratch cache, then its own token trees,
//! so cached byte slices can never dangle into freed trees.

use crate::{
    client::Client,
    config::RequestConfig,
    error::ClientError,
    select::{select_nodes, NodeMatch, SelectionParams},
    types::{JsonRpcRequest, JsonRpcResponse, NodeResponse, SignatureKind},
    verify::{VerificationContext, VerifyOutcome},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Observable state of a context, as returned by `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Terminal: the verified result is available.
    Success,
    /// A required sub-context must resolve before this one can proceed.
    WaitingForRequiredCtx,
    /// The caller must perform the transport/signer exchange for the
    /// pending context and feed the responses back.
    WaitingForResponse,
    /// Terminal: the context carries an error.
    Error,
}

impl ExecState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// What kind of external exchange a context performs at its suspension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// A JSON-RPC exchange with selected chain nodes.
    Rpc,
    /// A local signer exchange; never touches the network.
    Sign { message: Vec<u8>, account: Vec<u8>, signature_kind: SignatureKind },
}

/// The unit of work: one logical RPC call or batch.
///
/// Field order is load-bearing for drop semantics: `required` is released
/// first, then `cache`, then the token trees.
pub struct RequestContext {
    /// At most one outstanding dependency at a time; a linear chain, never a
    /// general graph.
    required: Option<Box<RequestContext>>,
    /// Scratch cache for verifier-derived data; lives exactly as long as
    /// this context.
    pub cache: crate::cache_list::CacheEntryList,
    requests: Vec<JsonRpcRequest>,
    configs: Vec<RequestConfig>,
    kind: RequestKind,
    chain_id: u64,
    /// Candidate nodes of the current round, selection order preserved.
    matches: Vec<NodeMatch>,
    /// URLs of the current round, parallel to `matches`.
    round_urls: Vec<Arc<str>>,
    /// Raw per-URL responses of the current round, parallel to `matches`.
    responses: Option<Vec<NodeResponse>>,
    /// Reissued rounds so far.
    attempt: u32,
    verified_result: Option<Value>,
    error: Option<ClientError>,
    selection: SelectionParams,
}

impl RequestContext {
    /// Creates a context for a single RPC call.
    #[must_use]
    pub fn new(request: JsonRpcRequest, config: RequestConfig, chain_id: u64) -> Self {
        Self::new_batch(vec![request], vec![config], chain_id)
    }

    /// Creates a context for a batched call; `configs` carries one
    /// verification snapshot per sub-call.
    #[must_use]
    pub fn new_batch(
        requests: Vec<JsonRpcRequest>,
        configs: Vec<RequestConfig>,
        chain_id: u64,
    ) -> Self {
        debug_assert_eq!(requests.len(), configs.len());
        Self {
            required: None,
            cache: crate::cache_list::CacheEntryList::new(),
            requests,
            configs,
            kind: RequestKind::Rpc,
            chain_id,
            matches: Vec::new(),
            round_urls: Vec::new(),
            responses: None,
            attempt: 0,
            verified_result: None,
            error: None,
            selection: SelectionParams::default(),
        }
    }

    /// Creates a signing context.
    #[must_use]
    pub fn new_sign(
        message: Vec<u8>,
        account: Vec<u8>,
        signature_kind: SignatureKind,
        config: RequestConfig,
        chain_id: u64,
    ) -> Self {
        let request = JsonRpcRequest::new("sign", Value::Null, 1);
        let mut ctx = Self::new(request, config, chain_id);
        ctx.kind = RequestKind::Sign { message, account, signature_kind };
        ctx
    }

    /// Overrides the node-selection filters for this request.
    pub fn set_selection(&mut self, selection: SelectionParams) {
        self.selection = selection;
    }

    #[must_use]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    #[must_use]
    pub fn method(&self) -> &str {
        self.requests.first().map_or("", |r| r.method.as_str())
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The verified result, once the context reached `Success`.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.verified_result.as_ref()
    }

    /// The terminal error, once the context reached `Error`.
    #[must_use]
    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> ExecState {
        if self.error.is_some() {
            ExecState::Error
        } else if self.verified_result.is_some() {
            ExecState::Success
        } else if self.required.as_ref().is_some_and(|c| !c.state().is_terminal()) {
            ExecState::WaitingForRequiredCtx
        } else if self.responses.is_none() && !self.round_urls.is_empty() {
            ExecState::WaitingForResponse
        } else {
            // Fresh, or mid-round with responses pending processing.
            ExecState::WaitingForResponse
        }
    }

    /// Attaches a required sub-context.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyExists`] if a different unresolved
    /// child (by method) is attached; the dependency chain stays linear with
    /// one outstanding request at a time.
    pub fn add_required(&mut self, child: RequestContext) -> Result<(), ClientError> {
        if let Some(existing) = &self.required {
            if existing.method() != child.method() && !existing.state().is_terminal() {
                return Err(ClientError::AlreadyExists(format!(
                    "unresolved required context for {}",
                    existing.method()
                )));
            }
        }
        debug!(parent = self.method(), child = child.method(), "required context attached");
        self.required = Some(Box::new(child));
        Ok(())
    }

    /// Probes for a previously created required child by method name.
    ///
    /// Verifiers call this before demanding data so the same missing datum
    /// is never requested twice over the network.
    #[must_use]
    pub fn find_required(&self, method: &str) -> Option<&RequestContext> {
        self.required.as_deref().filter(|c| c.method() == method)
    }

    /// Detaches the required child, if any.
    pub fn take_required(&mut self) -> Option<Box<RequestContext>> {
        self.required.take()
    }

    /// The deepest context currently awaiting an external exchange; this is
    /// where the driver must deliver responses.
    pub fn pending_mut(&mut self) -> &mut RequestContext {
        if self.required.as_ref().is_some_and(|child| !child.state().is_terminal()) {
            self.required.as_mut().unwrap().pending_mut()
        } else {
            self
        }
    }

    /// The wire payload for the current round: a single JSON-RPC object, or
    /// an array for batches.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidData`] if the token tree cannot be
    /// serialized.
    pub fn request_payload(&self) -> Result<String, ClientError> {
        let serialized = if self.requests.len() == 1 {
            serde_json::to_string(&self.requests[0])
        } else {
            serde_json::to_string(&self.requests)
        };
        serialized.map_err(|e| ClientError::InvalidData(format!("request serialization: {e}")))
    }

    /// URLs selected for the current round.
    #[must_use]
    pub fn round_urls(&self) -> &[Arc<str>] {
        &self.round_urls
    }

    /// Delivers the raw per-URL responses of the current round.
    pub fn set_responses(&mut self, responses: Vec<NodeResponse>) {
        self.responses = Some(responses);
    }

    /// Advances the context as far as possible without blocking.
    ///
    /// Post-terminal calls are idempotent: a context in `Success` or `Error`
    /// is returned unchanged.
    pub fn execute(&mut self, client: &Client) -> ExecState {
        loop {
            if self.error.is_some() {
                return ExecState::Error;
            }
            if self.verified_result.is_some() {
                return ExecState::Success;
            }

            // Step 1: resolve the required chain depth-first.
            if let Some(child) = self.required.as_mut() {
                match child.execute(client) {
                    ExecState::Success => {
                        trace!(child = child.method(), "required context resolved");
                        // Leave it attached: the verifier consumes it.
                    }
                    ExecState::Error => {
                        // Propagate verbatim so the caller sees the root cause.
                        let err = child
                            .error()
                            .cloned()
                            .unwrap_or_else(|| ClientError::Unknown("required context".into()));
                        return self.fail(err);
                    }
                    waiting => return waiting,
                }
            }

            // Step 2: no raw response yet — open a round.
            if self.responses.is_none() {
                match self.open_round(client) {
                    Ok(opened_locally) => {
                        if !opened_locally {
                            return ExecState::WaitingForResponse;
                        }
                        // pre_handle answered locally; fall through to verify.
                    }
                    Err(e) => return self.fail(e),
                }
            }

            // Steps 3-5: parse, verify, and decide retry vs terminal.
            match self.process_round(client) {
                RoundOutcome::Done(state) => return state,
                RoundOutcome::Retry => {
                    self.attempt += 1;
                    if self.attempt >= client.config().max_attempts {
                        // The last informative message left in the error slot
                        // becomes terminal; a proof failing on the final
                        // attempt surfaces instead of a generic message.
                        let last = self.error.take().unwrap_or_else(|| {
                            ClientError::NoResponse("all nodes exhausted".into())
                        });
                        warn!(method = self.method(), attempts = self.attempt, "giving up");
                        return self.fail(last);
                    }
                    self.error = None;
                    self.clear_round();
                }
            }
        }
    }

    /// Opens a round: `pre_handle` first, then node selection. Returns
    /// `Ok(true)` if the round was answered locally without the network.
    fn open_round(&mut self, client: &Client) -> Result<bool, ClientError> {
        if let RequestKind::Sign { .. } = self.kind {
            // Sign contexts have exactly one counterpart, the signer.
            self.round_urls = Vec::new();
            self.matches = Vec::new();
            return Ok(false);
        }

        let chain = client
            .chain(self.chain_id)
            .ok_or_else(|| ClientError::NotFound(format!("chain {}", self.chain_id)))?;
        let verifier = client.verifiers().get(chain.kind)?;

        if let Some(local) = verifier.pre_handle(&self.requests[0], &chain)? {
            debug!(method = self.method(), "request satisfied locally by pre_handle");
            let body = serde_json::to_string(&JsonRpcResponse {
                jsonrpc: crate::types::JSONRPC_VERSION_COW,
                result: Some(local),
                error: None,
                id: Arc::clone(&self.requests[0].id),
                proof: None,
            })
            .map_err(|e| ClientError::InvalidData(format!("local response: {e}")))?;
            self.matches = Vec::new();
            self.round_urls = Vec::new();
            self.responses = Some(vec![NodeResponse::local(body)]);
            return Ok(true);
        }

        let mut params = self.selection.clone();
        params.request_count = client.config().request_count;
        let matches = select_nodes(&chain, &params, &mut *client.rng())?;
        self.round_urls = matches
            .iter()
            .map(|m| Arc::clone(&chain.nodes()[m.node_index].url))
            .collect();
        self.matches = matches;
        Ok(false)
    }

    /// Processes the delivered responses of one round.
    fn process_round(&mut self, client: &Client) -> RoundOutcome {
        let responses = self.responses.take().unwrap_or_default();
        // Sign rounds bypass verification: the signer's answer is the result.
        if let RequestKind::Sign { .. } = self.kind {
            return self.process_sign_round(&responses);
        }

        let mut errors: Vec<String> = Vec::new();
        let mut saw_payload = false;
        let mut decision: Option<RoundDecision> = None;

        for (slot, resp) in responses.iter().enumerate() {
            let node_index = self.matches.get(slot).map(|m| m.node_index);

            if let Some(msg) = &resp.error {
                // Transport-level failure (timeout or unreachable): the node
                // is rotated, not blacklisted, until timeouts repeat.
                if let Some(i) = node_index {
                    client.note_timeout(self.chain_id, i);
                }
                errors.push(msg.clone());
                continue;
            }
            let Some(body) = &resp.result else {
                // Contract violation by the transport; treat as no response.
                errors.push("empty response".into());
                continue;
            };

            let parsed = match self.parse_bodies(body) {
                Ok(p) => p,
                Err(e) => {
                    // Structurally invalid body is misbehavior, not bad luck.
                    if let Some(i) = node_index {
                        client.note_misbehavior(self.chain_id, i);
                    }
                    errors.push(e.to_string());
                    continue;
                }
            };

            if let Some(remote) = parsed.iter().find_map(|r| r.error.as_ref()) {
                if let Some(i) = node_index {
                    client.note_response(self.chain_id, i, resp.elapsed);
                }
                errors.push(format!("{} ({})", remote.message, remote.code));
                continue;
            }
            saw_payload = true;

            match self.verify_parsed(client, &parsed) {
                Ok(VerifyOutcome::Valid { verified_hashes }) => {
                    if let Some(i) = node_index {
                        client.note_response(self.chain_id, i, resp.elapsed);
                    }
                    decision = Some(RoundDecision::Verified {
                        result: Self::collect_results(&parsed),
                        verified_hashes,
                    });
                    break;
                }
                Ok(VerifyOutcome::NeedsData { method, params }) => {
                    decision = Some(RoundDecision::NeedsChild { method, params });
                    break;
                }
                Ok(VerifyOutcome::InvalidProof { reason }) => {
                    warn!(
                        method = self.method(),
                        node = node_index,
                        reason = %reason,
                        "proof verification failed"
                    );
                    if let Some(i) = node_index {
                        client.note_misbehavior(self.chain_id, i);
                    }
                    errors.push(reason);
                }
                Err(e) => {
                    decision = Some(RoundDecision::Internal(e));
                    break;
                }
            }
        }

        match decision {
            Some(RoundDecision::Verified { result, verified_hashes }) => {
                client.cache_verified_hashes(self.chain_id, &verified_hashes);
                self.required = None;
                self.verified_result = Some(result);
                debug!(method = self.method(), "request verified");
                RoundOutcome::Done(ExecState::Success)
            }
            Some(RoundDecision::NeedsChild { method, params }) => {
                if self.find_required(&method).is_none() {
                    let child = match client.new_child_context(&method, params, self.chain_id) {
                        Ok(c) => c,
                        Err(e) => return RoundOutcome::Done(self.fail(e)),
                    };
                    if let Err(e) = self.add_required(child) {
                        return RoundOutcome::Done(self.fail(e));
                    }
                }
                // The original responses are kept: once the child resolves,
                // the same raw data is re-verified without re-sending the
                // request to any further node, and the round does not count
                // against the attempt budget.
                self.responses = Some(responses);
                RoundOutcome::Done(ExecState::WaitingForRequiredCtx)
            }
            Some(RoundDecision::Internal(e)) => RoundOutcome::Done(self.fail(e)),
            None => {
                // Nothing in this round verified. The last informative
                // message is parked in the error slot; exhaustion makes it
                // terminal, a retry clears it.
                let message = if errors.is_empty() {
                    "no usable response".to_string()
                } else {
                    errors.join("; ")
                };
                self.error = Some(if saw_payload {
                    ClientError::InvalidData(message)
                } else {
                    ClientError::NoResponse(message)
                });
                RoundOutcome::Retry
            }
        }
    }

    fn process_sign_round(&mut self, responses: &[NodeResponse]) -> RoundOutcome {
        for resp in responses {
            if let Some(body) = &resp.result {
                self.verified_result = Some(Value::String(body.clone()));
                return RoundOutcome::Done(ExecState::Success);
            }
        }
        let message = responses
            .iter()
            .filter_map(|r| r.error.clone())
            .collect::<Vec<_>>()
            .join("; ");
        self.error = Some(ClientError::NoResponse(if message.is_empty() {
            "signer returned nothing".into()
        } else {
            message
        }));
        RoundOutcome::Retry
    }

    /// Parses one node's raw body into per-sub-call responses.
    fn parse_bodies(&self, body: &str) -> Result<Vec<JsonRpcResponse>, ClientError> {
        let parsed: Result<Vec<JsonRpcResponse>, _> = if self.requests.len() == 1 {
            serde_json::from_str::<JsonRpcResponse>(body).map(|r| vec![r])
        } else {
            serde_json::from_str::<Vec<JsonRpcResponse>>(body)
        };
        let parsed =
            parsed.map_err(|e| ClientError::InvalidData(format!("malformed response: {e}")))?;
        if parsed.len() != self.requests.len() {
            return Err(ClientError::InvalidData(format!(
                "expected {} sub-responses, got {}",
                self.requests.len(),
                parsed.len()
            )));
        }
        Ok(parsed)
    }

    /// Verifies every sub-response against its config snapshot. The first
    /// non-`Valid` outcome decides the round.
    fn verify_parsed(
        &mut self,
        client: &Client,
        parsed: &[JsonRpcResponse],
    ) -> Result<VerifyOutcome, ClientError> {
        let (kind, chain_id) = {
            let chain = client
                .chain(self.chain_id)
                .ok_or_else(|| ClientError::NotFound(format!("chain {}", self.chain_id)))?;
            (chain.kind, chain.id)
        };
        let verifier = client.verifiers().get(kind)?;

        let mut all_hashes = Vec::new();
        for (i, sub) in parsed.iter().enumerate() {
            let config = self.configs[i].clone();
            let result = sub.result.clone().unwrap_or(Value::Null);
            let proof = sub.proof.clone();
            let mut vctx = VerificationContext {
                chain_id,
                chain_kind: kind,
                config,
                result,
                proof,
                ctx: self,
            };
            match verifier.verify(&mut vctx)? {
                VerifyOutcome::Valid { mut verified_hashes } => {
                    all_hashes.append(&mut verified_hashes);
                }
                other => return Ok(other),
            }
        }
        Ok(VerifyOutcome::Valid { verified_hashes: all_hashes })
    }

    fn collect_results(parsed: &[JsonRpcResponse]) -> Value {
        if parsed.len() == 1 {
            parsed[0].result.clone().unwrap_or(Value::Null)
        } else {
            Value::Array(parsed.iter().map(|r| r.result.clone().unwrap_or(Value::Null)).collect())
        }
    }

    fn clear_round(&mut self) {
        self.responses = None;
        self.matches = Vec::new();
        self.round_urls = Vec::new();
    }

    pub(crate) fn fail(&mut self, error: ClientError) -> ExecState {
        debug!(method = self.method(), %error, "context failed");
        self.error = Some(error);
        ExecState::Error
    }
}

enum RoundOutcome {
    /// The round decided the context's next observable state.
    Done(ExecState),
    /// The round failed; reissue if the attempt budget allows.
    Retry,
}

enum RoundDecision {
    Verified { result: Value, verified_hashes: Vec<crate::types::VerifiedHash> },
    NeedsChild { method: String, params: Value },
    Internal(ClientError),
}
