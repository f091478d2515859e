//! Quill Cache - encrypted, capacity-bounded artifact cache
//!
//! Generated documents and requirement analyses are expensive to produce
//! and sensitive to leak. This crate keeps them encrypted at rest under a
//! keychain-held primary key, verifies integrity on every read, and bounds
//! the cache by entry count and ciphertext bytes with shared LRU eviction.
//!
//! ```no_run
//! use quill_cache::{CacheConfig, DocumentCache, DocumentKind, GeneratedDocument};
//!
//! # async fn demo() -> Result<(), quill_cache::CacheError> {
//! let cache = DocumentCache::with_keychain("com.quill.cache", CacheConfig::default())?;
//!
//! let doc = GeneratedDocument::new(
//!     DocumentKind::RequestForQuote,
//!     "500 widgets by Q3",
//!     b"RFQ: 500 widgets...".to_vec(),
//! );
//! cache.cache_document(&doc).await?;
//!
//! let hit = cache
//!     .get_cached_document(DocumentKind::RequestForQuote, "500 widgets by Q3")
//!     .await;
//! assert!(hit.is_some());
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod cache;
pub mod config;
pub mod document;
pub mod entry;
pub mod error;
pub mod stats;

mod store;

pub use backup::{BackupPackage, FORMAT_VERSION};
pub use cache::DocumentCache;
pub use config::CacheConfig;
pub use document::{AnalysisRecord, DocumentKind, GeneratedDocument};
pub use entry::{CacheKey, EncryptedEntry, EntryMetadata};
pub use error::CacheError;
pub use stats::CacheStatistics;
