//! Cache keys and encrypted entries
//!
//! An entry is sealed at write time: plaintext is checksummed, then
//! encrypted under the primary key. Opening decrypts and re-verifies the
//! checksum, so corruption surfaces here and nowhere else.

use chrono::{DateTime, Utc};
use quill_crypto::cipher::{self, CipherError, NONCE_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::document::DocumentKind;

/// Lower-case and trim request text so semantically identical requests
/// collide to the same key. Normalization is the cache's job, not the
/// caller's.
pub fn normalize_request(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Identity of a cached artifact. Documents are keyed by category plus
/// normalized request text; analyses by request text alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Document { kind: DocumentKind, request: String },
    Analysis { request: String },
}

impl CacheKey {
    pub fn document(kind: DocumentKind, request_text: &str) -> Self {
        Self::Document {
            kind,
            request: normalize_request(request_text),
        }
    }

    pub fn analysis(request_text: &str) -> Self {
        Self::Analysis {
            request: normalize_request(request_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Human-readable artifact kind, for statistics and debugging
    pub kind_label: String,
    pub cached_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    /// Hex SHA-256 of the plaintext, verified on every read
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEntry {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub metadata: EntryMetadata,
}

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("entry failed to decrypt")]
    Decryption(#[from] CipherError),
    #[error("entry checksum mismatch after decrypt")]
    IntegrityMismatch,
}

impl EncryptedEntry {
    /// Checksum and encrypt `plaintext` under `key`
    pub fn seal(plaintext: &[u8], kind_label: &str, key: &[u8]) -> Result<Self, CipherError> {
        let checksum = cipher::sha256_hex(plaintext);
        let (ciphertext, nonce) = cipher::encrypt(plaintext, key)?;
        let now = Utc::now();
        Ok(Self {
            ciphertext,
            nonce,
            metadata: EntryMetadata {
                kind_label: kind_label.to_string(),
                cached_at: now,
                last_accessed: now,
                access_count: 0,
                checksum,
            },
        })
    }

    /// Decrypt and verify the plaintext checksum
    pub fn open(&self, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, OpenError> {
        let plaintext = cipher::decrypt(&self.ciphertext, &self.nonce, key)?;
        if cipher::sha256_hex(&plaintext) != self.metadata.checksum {
            return Err(OpenError::IntegrityMismatch);
        }
        Ok(plaintext)
    }

    /// Record a successful read
    pub fn touch(&mut self) {
        self.metadata.last_accessed = Utc::now();
        self.metadata.access_count += 1;
    }
}
