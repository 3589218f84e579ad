//! Per-context scratch cache.
//!
//! Verifiers stash derived data here (decoded receipts, temporary proofs)
//! that must live exactly as long as the owning request context. Lookup is a
//! linear scan; the list length is bounded by proof complexity, not by
//! request volume, so this is never a performance path.

/// One owned byte buffer, optionally keyed for later lookup.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: Option<String>,
    pub data: Vec<u8>,
}

/// Append-only list of owned buffers attached to a request context.
///
/// Entries are dropped exactly once, together with the context.
#[derive(Debug, Default)]
pub struct CacheEntryList {
    entries: Vec<CacheEntry>,
}

impl CacheEntryList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stashes an anonymous buffer and returns a reference to it.
    pub fn push(&mut self, data: Vec<u8>) -> &[u8] {
        self.entries.push(CacheEntry { key: None, data });
        &self.entries.last().expect("just pushed").data
    }

    /// Stashes a keyed buffer, replacing any existing entry with that key.
    pub fn insert(&mut self, key: impl Into<String>, data: Vec<u8>) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key.as_deref() == Some(&key)) {
            entry.data = data;
        } else {
            self.entries.push(CacheEntry { key: Some(key), data });
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key.as_deref() == Some(key))
            .map(|e| e.data.as_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
