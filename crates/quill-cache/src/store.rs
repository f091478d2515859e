//! Entry store, recency tracking, and eviction
//!
//! Two maps (documents, analyses) share a single recency list, so eviction
//! pressure is strict LRU across both artifact kinds. Every read or write
//! moves the touched key to the MRU tail; eviction always pops the head.
//!
//! Reads never fail: an entry that does not decrypt or does not match its
//! checksum is purged and the lookup becomes a miss.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::CacheConfig;
use crate::document::DocumentKind;
use crate::entry::{CacheKey, EncryptedEntry, OpenError};
use crate::stats::{self, CacheStatistics};

pub(crate) struct CacheState {
    pub(crate) documents: HashMap<CacheKey, EncryptedEntry>,
    pub(crate) analyses: HashMap<CacheKey, EncryptedEntry>,
    /// LRU at the head, MRU at the tail
    pub(crate) recency: VecDeque<CacheKey>,
    pub(crate) config: CacheConfig,
    hits: u64,
    misses: u64,
    evictions: u64,
    last_cleanup: Option<DateTime<Utc>>,
}

impl CacheState {
    pub(crate) fn new(config: CacheConfig) -> Self {
        Self {
            documents: HashMap::new(),
            analyses: HashMap::new(),
            recency: VecDeque::new(),
            config,
            hits: 0,
            misses: 0,
            evictions: 0,
            last_cleanup: None,
        }
    }

    fn map_for(&self, key: &CacheKey) -> &HashMap<CacheKey, EncryptedEntry> {
        match key {
            CacheKey::Document { .. } => &self.documents,
            CacheKey::Analysis { .. } => &self.analyses,
        }
    }

    fn map_for_mut(&mut self, key: &CacheKey) -> &mut HashMap<CacheKey, EncryptedEntry> {
        match key {
            CacheKey::Document { .. } => &mut self.documents,
            CacheKey::Analysis { .. } => &mut self.analyses,
        }
    }

    /// Store an entry, overwriting any existing entry under the same key,
    /// then enforce both capacity bounds
    pub(crate) fn insert(&mut self, key: CacheKey, entry: EncryptedEntry) {
        self.map_for_mut(&key).insert(key.clone(), entry);
        self.mark_used(&key);
        self.enforce_bounds();
    }

    /// Decrypt and return an entry's plaintext, counting a hit or miss.
    /// Undecryptable or checksum-mismatched entries are purged.
    pub(crate) fn get(&mut self, key: &CacheKey, key_bytes: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let Some(entry) = self.map_for(key).get(key) else {
            self.misses += 1;
            return None;
        };

        match entry.open(key_bytes) {
            Ok(plaintext) => {
                if let Some(entry) = self.map_for_mut(key).get_mut(key) {
                    entry.touch();
                }
                self.mark_used(key);
                self.hits += 1;
                Some(plaintext)
            }
            Err(e) => {
                match e {
                    OpenError::Decryption(_) => warn!(?key, "purging entry that failed to decrypt"),
                    OpenError::IntegrityMismatch => warn!(?key, "purging entry with checksum mismatch"),
                }
                self.remove(key);
                self.misses += 1;
                None
            }
        }
    }

    /// Drop an entry that decrypted but failed to deserialize. The hit was
    /// already counted by [`CacheState::get`]; re-book it as a miss.
    pub(crate) fn discard_corrupt(&mut self, key: &CacheKey) {
        warn!(?key, "purging entry with undecodable plaintext");
        self.remove(key);
        self.hits = self.hits.saturating_sub(1);
        self.misses += 1;
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<EncryptedEntry> {
        let removed = self.map_for_mut(key).remove(key);
        if removed.is_some() {
            self.recency.retain(|k| k != key);
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.documents.clear();
        self.analyses.clear();
        self.recency.clear();
    }

    fn mark_used(&mut self, key: &CacheKey) {
        self.recency.retain(|k| k != key);
        self.recency.push_back(key.clone());
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.documents.len() + self.analyses.len()
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.documents
            .values()
            .chain(self.analyses.values())
            .map(|e| e.ciphertext.len() as u64)
            .sum()
    }

    fn evict_lru(&mut self) -> bool {
        let Some(key) = self.recency.pop_front() else {
            return false;
        };
        self.map_for_mut(&key).remove(&key);
        self.evictions += 1;
        debug!(?key, "evicted least-recently-used entry");
        true
    }

    /// Apply both capacity bounds, count first
    pub(crate) fn enforce_bounds(&mut self) {
        self.enforce_count_bound();
        self.enforce_byte_bound();
    }

    fn enforce_count_bound(&mut self) {
        while self.entry_count() > self.config.max_entries {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Byte-bound sweep. Total size is recomputed after each eviction so
    /// the sweep stops as soon as the budget is met.
    pub(crate) fn enforce_byte_bound(&mut self) {
        while self.total_bytes() > self.config.max_bytes {
            if !self.evict_lru() {
                break;
            }
        }
    }

    pub(crate) fn optimize_for_memory(&mut self) {
        self.enforce_byte_bound();
        self.last_cleanup = Some(Utc::now());
    }

    /// Rebuild the recency list from entry metadata, oldest access first.
    /// Used after a backup import, where live access order is gone.
    pub(crate) fn rebuild_recency(&mut self) {
        let mut keyed: Vec<(DateTime<Utc>, CacheKey)> = self
            .documents
            .iter()
            .chain(self.analyses.iter())
            .map(|(k, e)| (e.metadata.last_accessed, k.clone()))
            .collect();
        keyed.sort_by_key(|(t, _)| *t);
        self.recency = keyed.into_iter().map(|(_, k)| k).collect();
    }

    pub(crate) fn statistics(&self) -> CacheStatistics {
        let mut by_kind: HashMap<DocumentKind, u64> = HashMap::new();
        for (key, entry) in &self.documents {
            if let CacheKey::Document { kind, .. } = key {
                *by_kind.entry(*kind).or_default() += entry.metadata.access_count;
            }
        }
        let mut ranked: Vec<(DocumentKind, u64)> = by_kind.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        CacheStatistics {
            document_count: self.documents.len(),
            analysis_count: self.analyses.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            total_bytes: self.total_bytes(),
            hit_rate: stats::hit_rate(self.hits, self.misses),
            last_cleanup: self.last_cleanup,
            most_accessed_kinds: ranked.into_iter().take(3).map(|(k, _)| k).collect(),
        }
    }
}
