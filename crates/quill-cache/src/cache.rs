//! The cache facade
//!
//! All mutable state (entry maps, recency list, primary key, counters)
//! lives behind one `tokio::sync::Mutex`, so concurrent callers serialize
//! into a single effective execution stream and no multi-step mutation can
//! interleave with another operation. The cache is an explicit value, not a
//! global: construct one per deployment (or per test) with the key store
//! you want it to use.

use std::collections::HashMap;

use quill_crypto::cipher::{self, CipherError};
use quill_crypto::{KeyManager, KeyStore, KeychainStore, PrimaryKey};
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::backup::{self, BackupPayload};
use crate::config::CacheConfig;
use crate::document::{AnalysisRecord, DocumentKind, GeneratedDocument};
use crate::entry::{CacheKey, EncryptedEntry};
use crate::error::CacheError;
use crate::stats::CacheStatistics;
use crate::store::CacheState;

struct Inner {
    store: CacheState,
    key: PrimaryKey,
    keys: KeyManager,
}

/// Encrypted, capacity-bounded cache for generated documents and
/// requirement analyses
pub struct DocumentCache {
    inner: Mutex<Inner>,
}

impl DocumentCache {
    /// Build a cache over an injected key store. Loads the persisted
    /// primary key, generating and persisting one if the store is empty.
    pub fn new(key_store: Box<dyn KeyStore>, config: CacheConfig) -> Result<Self, CacheError> {
        let keys = KeyManager::new(key_store);
        let key = keys.load_or_create()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                store: CacheState::new(config),
                key,
                keys,
            }),
        })
    }

    /// Convenience constructor using the OS keychain under `service_name`
    pub fn with_keychain(service_name: &str, config: CacheConfig) -> Result<Self, CacheError> {
        Self::new(Box::new(KeychainStore::new(service_name)), config)
    }

    /// Encrypt and store a generated document, keyed by its category and
    /// normalized request text. Overwrites any previous document under the
    /// same key.
    pub async fn cache_document(&self, document: &GeneratedDocument) -> Result<(), CacheError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(document)?);
        let key = CacheKey::document(document.kind, &document.request_text);

        let mut inner = self.inner.lock().await;
        let entry = EncryptedEntry::seal(&plaintext, document.kind.label(), inner.key.key_bytes())?;
        inner.store.insert(key, entry);
        Ok(())
    }

    /// Look up a cached document. Returns `None` on a genuine miss and on
    /// any decrypt, integrity, or decode failure (the entry is purged).
    pub async fn get_cached_document(
        &self,
        kind: DocumentKind,
        request_text: &str,
    ) -> Option<GeneratedDocument> {
        let key = CacheKey::document(kind, request_text);
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let plaintext = inner.store.get(&key, inner.key.key_bytes())?;
        match serde_json::from_slice(&plaintext) {
            Ok(document) => Some(document),
            Err(_) => {
                inner.store.discard_corrupt(&key);
                None
            }
        }
    }

    /// Encrypt and store a requirement-analysis result, keyed by normalized
    /// request text alone
    pub async fn cache_analysis(
        &self,
        request_text: &str,
        response: &str,
        recommended_kinds: Vec<DocumentKind>,
    ) -> Result<(), CacheError> {
        let record = AnalysisRecord {
            response: response.to_string(),
            recommended_kinds,
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&record)?);
        let key = CacheKey::analysis(request_text);

        let mut inner = self.inner.lock().await;
        let entry = EncryptedEntry::seal(&plaintext, "Requirements Analysis", inner.key.key_bytes())?;
        inner.store.insert(key, entry);
        Ok(())
    }

    pub async fn get_cached_analysis(
        &self,
        request_text: &str,
    ) -> Option<(String, Vec<DocumentKind>)> {
        let key = CacheKey::analysis(request_text);
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let plaintext = inner.store.get(&key, inner.key.key_bytes())?;
        match serde_json::from_slice::<AnalysisRecord>(&plaintext) {
            Ok(record) => Some((record.response, record.recommended_kinds)),
            Err(_) => {
                inner.store.discard_corrupt(&key);
                None
            }
        }
    }

    /// Drop every cached entry. Hit/miss/eviction counters survive.
    pub async fn clear_cache(&self) {
        self.inner.lock().await.store.clear();
    }

    pub async fn statistics(&self) -> CacheStatistics {
        self.inner.lock().await.store.statistics()
    }

    /// Force an immediate byte-bound eviction sweep
    pub async fn optimize_for_memory(&self) {
        self.inner.lock().await.store.optimize_for_memory();
    }

    /// Replace the primary key, re-encrypting every entry under the new
    /// one. Entries that no longer decrypt are purged, not fatal: they were
    /// unreadable anyway. Nothing is committed until the full sweep and the
    /// key-store save succeed, so cancellation at any checkpoint leaves the
    /// old state intact.
    pub async fn rotate_key(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        let new_key = inner.keys.generate()?;

        let mut migrated_documents = HashMap::new();
        let mut migrated_analyses = HashMap::new();
        let mut purged: Vec<CacheKey> = Vec::new();

        for (key, entry) in &inner.store.documents {
            match migrate_entry(entry, &inner.key, &new_key)? {
                Some(migrated) => {
                    migrated_documents.insert(key.clone(), migrated);
                }
                None => {
                    warn!(?key, "purging unreadable entry during key rotation");
                    purged.push(key.clone());
                }
            }
            tokio::task::yield_now().await;
        }

        for (key, entry) in &inner.store.analyses {
            match migrate_entry(entry, &inner.key, &new_key)? {
                Some(migrated) => {
                    migrated_analyses.insert(key.clone(), migrated);
                }
                None => {
                    warn!(?key, "purging unreadable entry during key rotation");
                    purged.push(key.clone());
                }
            }
            tokio::task::yield_now().await;
        }

        // Persist first: if the key store rejects the save, the old key and
        // entries remain untouched and the caller can retry.
        inner.keys.persist(&new_key)?;

        inner.key = new_key;
        inner.store.documents = migrated_documents;
        inner.store.analyses = migrated_analyses;
        inner.store.recency.retain(|k| !purged.contains(k));

        info!(purged = purged.len(), "encryption key rotated");
        Ok(())
    }

    /// Serialize both maps (keys, ciphertexts, metadata) and encrypt the
    /// whole buffer under the current primary key
    pub async fn export_backup(&self) -> Result<Vec<u8>, CacheError> {
        let inner = self.inner.lock().await;
        let payload = BackupPayload {
            documents: inner
                .store
                .documents
                .iter()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
            analyses: inner
                .store
                .analyses
                .iter()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        };
        backup::write_package(&payload, &inner.key)
    }

    /// Replace the cache contents with a previously exported backup.
    /// Recency order is rebuilt from entry metadata and both capacity
    /// bounds are re-enforced.
    pub async fn import_backup(&self, bytes: &[u8]) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        let payload = backup::read_package(bytes, &inner.key)?;

        inner.store.clear();
        for (key, entry) in payload.documents {
            inner.store.documents.insert(key, entry);
        }
        for (key, entry) in payload.analyses {
            inner.store.analyses.insert(key, entry);
        }
        inner.store.rebuild_recency();
        inner.store.enforce_bounds();

        info!(
            documents = inner.store.documents.len(),
            analyses = inner.store.analyses.len(),
            "backup imported"
        );
        Ok(())
    }
}

/// Re-encrypt one entry under the new key, preserving its metadata.
/// `Ok(None)` means the entry no longer decrypts and should be purged;
/// `Err` is a catastrophic encryption failure that aborts the rotation.
fn migrate_entry(
    entry: &EncryptedEntry,
    old_key: &PrimaryKey,
    new_key: &PrimaryKey,
) -> Result<Option<EncryptedEntry>, CipherError> {
    let Ok(plaintext) = entry.open(old_key.key_bytes()) else {
        return Ok(None);
    };
    let (ciphertext, nonce) = cipher::encrypt(&plaintext, new_key.key_bytes())?;
    Ok(Some(EncryptedEntry {
        ciphertext,
        nonce,
        metadata: entry.metadata.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_crypto::MemoryKeyStore;
    use std::sync::Arc;

    fn new_cache() -> DocumentCache {
        DocumentCache::new(Box::new(MemoryKeyStore::new()), CacheConfig::default()).unwrap()
    }

    fn rfq(request: &str, content: Vec<u8>) -> GeneratedDocument {
        GeneratedDocument::new(DocumentKind::RequestForQuote, request, content)
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let cache = new_cache();
        let doc = rfq("Widget Purchase", b"rfq for 500 widgets".to_vec());

        cache.cache_document(&doc).await.unwrap();
        let got = cache
            .get_cached_document(DocumentKind::RequestForQuote, "widget purchase")
            .await
            .unwrap();
        assert_eq!(got, doc);
    }

    #[tokio::test]
    async fn test_request_text_is_normalized() {
        let cache = new_cache();
        let doc = rfq("  Widget PURCHASE ", b"body".to_vec());
        cache.cache_document(&doc).await.unwrap();

        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "widget purchase")
            .await
            .is_some());
        // Different category misses
        assert!(cache
            .get_cached_document(DocumentKind::Contract, "widget purchase")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_only_latest() {
        let cache = new_cache();
        cache
            .cache_document(&rfq("widgets", b"version one".to_vec()))
            .await
            .unwrap();
        cache
            .cache_document(&rfq("widgets", b"version two".to_vec()))
            .await
            .unwrap();

        let got = cache
            .get_cached_document(DocumentKind::RequestForQuote, "widgets")
            .await
            .unwrap();
        assert_eq!(got.content, b"version two".to_vec());
        assert_eq!(cache.statistics().await.document_count, 1);
    }

    #[tokio::test]
    async fn test_analysis_roundtrip() {
        let cache = new_cache();
        cache
            .cache_analysis(
                "Need 500 widgets by Q3",
                "Recommend a simplified RFQ",
                vec![DocumentKind::RequestForQuote, DocumentKind::CostEstimate],
            )
            .await
            .unwrap();

        let (response, kinds) = cache
            .get_cached_analysis("need 500 widgets by q3")
            .await
            .unwrap();
        assert_eq!(response, "Recommend a simplified RFQ");
        assert_eq!(
            kinds,
            vec![DocumentKind::RequestForQuote, DocumentKind::CostEstimate]
        );
    }

    #[tokio::test]
    async fn test_corruption_scenario() {
        // Cache 500 bytes under (RFQ, "widget purchase"); read it back;
        // corrupt the 10th stored ciphertext byte; the next read is a miss
        // and the entry is gone; re-caching works again.
        let cache = new_cache();
        let body = vec![0x42u8; 500];
        cache
            .cache_document(&rfq("widget purchase", body.clone()))
            .await
            .unwrap();

        let got = cache
            .get_cached_document(DocumentKind::RequestForQuote, "widget purchase")
            .await
            .unwrap();
        assert_eq!(got.content, body);

        {
            let mut inner = cache.inner.lock().await;
            let key = CacheKey::document(DocumentKind::RequestForQuote, "widget purchase");
            inner.store.documents.get_mut(&key).unwrap().ciphertext[9] ^= 0x01;
        }

        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "widget purchase")
            .await
            .is_none());
        assert_eq!(cache.statistics().await.document_count, 0);

        cache
            .cache_document(&rfq("widget purchase", body.clone()))
            .await
            .unwrap();
        let again = cache
            .get_cached_document(DocumentKind::RequestForQuote, "widget purchase")
            .await
            .unwrap();
        assert_eq!(again.content, body);
    }

    #[tokio::test]
    async fn test_count_bound_via_facade() {
        let cache = DocumentCache::new(
            Box::new(MemoryKeyStore::new()),
            CacheConfig {
                max_entries: 2,
                max_bytes: u64::MAX,
            },
        )
        .unwrap();

        cache.cache_document(&rfq("a", b"1".to_vec())).await.unwrap();
        cache.cache_document(&rfq("b", b"2".to_vec())).await.unwrap();
        cache.cache_document(&rfq("c", b"3".to_vec())).await.unwrap();

        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "a")
            .await
            .is_none());
        let stats = cache.statistics().await;
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_rotation_preserves_entries_and_kills_old_key() {
        let cache = new_cache();
        cache
            .cache_document(&rfq("widgets", b"rfq body".to_vec()))
            .await
            .unwrap();
        cache
            .cache_analysis("widgets", "analysis", vec![DocumentKind::RequestForQuote])
            .await
            .unwrap();

        let (old_key_bytes, old_ciphertext, old_nonce) = {
            let inner = cache.inner.lock().await;
            let key = CacheKey::document(DocumentKind::RequestForQuote, "widgets");
            let entry = &inner.store.documents[&key];
            let mut kb = [0u8; 32];
            kb.copy_from_slice(inner.key.key_bytes());
            (kb, entry.ciphertext.clone(), entry.nonce)
        };

        cache.rotate_key().await.unwrap();

        // Entries still readable under the new key
        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "widgets")
            .await
            .is_some());
        assert!(cache.get_cached_analysis("widgets").await.is_some());

        // Nothing stored decrypts with the discarded key anymore
        let inner = cache.inner.lock().await;
        for entry in inner.store.documents.values().chain(inner.store.analyses.values()) {
            assert!(cipher::decrypt(&entry.ciphertext, &entry.nonce, &old_key_bytes).is_err());
        }
        // The pre-rotation ciphertext did decrypt with the old key
        assert!(cipher::decrypt(&old_ciphertext, &old_nonce, &old_key_bytes).is_ok());

        // The new key made it into the key store
        let persisted = inner.keys.load_or_create().unwrap();
        assert_eq!(persisted.key_bytes(), inner.key.key_bytes());
        assert_ne!(persisted.key_bytes(), &old_key_bytes[..]);
    }

    #[tokio::test]
    async fn test_rotation_purges_unreadable_entries() {
        let cache = new_cache();
        cache.cache_document(&rfq("good", b"keep".to_vec())).await.unwrap();
        cache.cache_document(&rfq("bad", b"drop".to_vec())).await.unwrap();

        {
            let mut inner = cache.inner.lock().await;
            let key = CacheKey::document(DocumentKind::RequestForQuote, "bad");
            inner.store.documents.get_mut(&key).unwrap().ciphertext[0] ^= 0xFF;
        }

        cache.rotate_key().await.unwrap();

        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "good")
            .await
            .is_some());
        assert!(cache
            .get_cached_document(DocumentKind::RequestForQuote, "bad")
            .await
            .is_none());
        assert_eq!(cache.statistics().await.document_count, 1);
    }

    #[tokio::test]
    async fn test_backup_roundtrip_across_instances() {
        let key_store = Arc::new(MemoryKeyStore::new());
        let source =
            DocumentCache::new(Box::new(key_store.clone()), CacheConfig::default()).unwrap();

        source
            .cache_document(&rfq("widgets", b"rfq body".to_vec()))
            .await
            .unwrap();
        source
            .cache_analysis("widgets", "analysis", vec![DocumentKind::CostEstimate])
            .await
            .unwrap();

        let blob = source.export_backup().await.unwrap();

        // A fresh instance over the same key store loads the same primary
        // key, so the backup decrypts and restores in full
        let restored =
            DocumentCache::new(Box::new(key_store.clone()), CacheConfig::default()).unwrap();
        restored.import_backup(&blob).await.unwrap();

        let doc = restored
            .get_cached_document(DocumentKind::RequestForQuote, "widgets")
            .await
            .unwrap();
        assert_eq!(doc.content, b"rfq body".to_vec());
        let (response, kinds) = restored.get_cached_analysis("widgets").await.unwrap();
        assert_eq!(response, "analysis");
        assert_eq!(kinds, vec![DocumentKind::CostEstimate]);
    }

    #[tokio::test]
    async fn test_import_rejects_foreign_backup() {
        let source = new_cache();
        source
            .cache_document(&rfq("widgets", b"body".to_vec()))
            .await
            .unwrap();
        let blob = source.export_backup().await.unwrap();

        // Different key store, different primary key
        let other = new_cache();
        assert!(matches!(
            other.import_backup(&blob).await,
            Err(CacheError::InvalidBackup(_))
        ));
        // The failed import left the cache untouched
        assert_eq!(other.statistics().await.document_count, 0);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let cache = new_cache();
        cache.cache_document(&rfq("a", b"1".to_vec())).await.unwrap();
        cache.cache_analysis("b", "r", vec![]).await.unwrap();

        cache.clear_cache().await;

        let stats = cache.statistics().await;
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.analysis_count, 0);
        assert_eq!(stats.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_optimize_for_memory_sweeps_and_stamps() {
        let cache = DocumentCache::new(
            Box::new(MemoryKeyStore::new()),
            CacheConfig {
                max_entries: 100,
                max_bytes: u64::MAX,
            },
        )
        .unwrap();
        cache
            .cache_document(&rfq("big", vec![0u8; 4096]))
            .await
            .unwrap();

        // Shrink the budget after the fact, then force a sweep
        cache.inner.lock().await.store.config.max_bytes = 100;
        cache.optimize_for_memory().await;

        let stats = cache.statistics().await;
        assert_eq!(stats.document_count, 0);
        assert!(stats.last_cleanup.is_some());
    }

    #[tokio::test]
    async fn test_statistics_hit_rate() {
        let cache = new_cache();
        cache.cache_document(&rfq("a", b"1".to_vec())).await.unwrap();

        cache
            .get_cached_document(DocumentKind::RequestForQuote, "a")
            .await;
        cache
            .get_cached_document(DocumentKind::RequestForQuote, "missing")
            .await;

        let stats = cache.statistics().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test]
    async fn test_concurrent_callers_serialize() {
        let cache = Arc::new(new_cache());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let doc = rfq(&format!("request {i}"), vec![i as u8; 64]);
                cache.cache_document(&doc).await.unwrap();
                cache
                    .get_cached_document(DocumentKind::RequestForQuote, &format!("request {i}"))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.statistics().await.document_count, 16);
    }
}
