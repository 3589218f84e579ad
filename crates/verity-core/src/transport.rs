//! External collaborator contracts.
//!
//! The engine never opens sockets, signs, or persists anything itself; it
//! reaches those capabilities through the traits below, injected at client
//! construction. There are no process-global defaults.

use crate::{
    error::SignerError,
    types::{Encoding, NodeResponse, Signature, SignatureKind},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};

/// Delivers one request payload to a set of node URLs.
///
/// The contract: exactly one [`NodeResponse`] per URL, in order, each with
/// its elapsed time. A URL that cannot be reached must still populate the
/// error side of its slot — never return fewer responses than URLs.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        payload: &str,
        urls: &[Arc<str>],
        timeout: Duration,
        encoding: Encoding,
    ) -> Vec<NodeResponse>;
}

/// Signs messages on behalf of locally managed accounts.
#[async_trait]
pub trait Signer: Send + Sync {
    /// # Errors
    ///
    /// Returns one of the fixed [`SignerError`] codes; there is no
    /// open-ended error surface in the signer contract.
    async fn sign(
        &self,
        message: &[u8],
        account: &[u8],
        kind: SignatureKind,
    ) -> Result<Signature, SignerError>;
}

/// Persists the node list and verified-hash cache across restarts.
///
/// A miss is always "must refetch", never fatal.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]);
    fn clear(&self);
}

/// Process-local [`Storage`]: survives nothing, useful as a default and in
/// tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: &[u8]) {
        self.entries.insert(key.to_string(), value.to_vec());
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nodelist:1"), None);

        storage.set("nodelist:1", &[1, 2, 3]);
        assert_eq!(storage.get("nodelist:1"), Some(vec![1, 2, 3]));

        storage.set("nodelist:1", &[9]);
        assert_eq!(storage.get("nodelist:1"), Some(vec![9]));

        storage.clear();
        assert_eq!(storage.get("nodelist:1"), None);
    }
}
