//! Cache error taxonomy
//!
//! Only write-path failures surface to callers: a failed `cache_*` must be
//! visible so the caller falls back to uncached generation. Read-path
//! decrypt and integrity failures never escape - the offending entry is
//! purged and the lookup reports a miss.

use quill_crypto::{CipherError, KeyError, KeychainError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Encryption key not found")]
    KeyNotFound,

    #[error("Encryption failed: {0}")]
    Encryption(#[from] CipherError),

    #[error("Secure storage error: {0}")]
    SecureStorage(String),

    #[error("Backup payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid backup package: {0}")]
    InvalidBackup(String),
}

impl From<KeychainError> for CacheError {
    fn from(e: KeychainError) -> Self {
        match e {
            KeychainError::NotFound => CacheError::KeyNotFound,
            other => CacheError::SecureStorage(other.to_string()),
        }
    }
}

impl From<KeyError> for CacheError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::Cipher(c) => CacheError::Encryption(c),
            KeyError::Storage(s) => s.into(),
            malformed @ KeyError::MalformedRecord { .. } => {
                CacheError::SecureStorage(malformed.to_string())
            }
        }
    }
}
