//! Primary key lifecycle
//!
//! One 256-bit symmetric key encrypts every cached artifact. It is wrapped
//! in `Zeroizing<>` so it is scrubbed from memory on drop, and persisted to
//! the secure key store as key || salt in a single record.
//!
//! The salt is generated and persisted with the key but the key itself is
//! directly random, not derived. The salt rides along in backup envelopes
//! so a future passphrase-derived scheme can reuse the same record layout.

use crate::cipher::{self, CipherError, KEY_SIZE, SALT_SIZE};
use crate::keychain::{KeyStore, KeychainError};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Secure storage error: {0}")]
    Storage(#[from] KeychainError),

    #[error("Stored key record has wrong length: expected {expected}, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },
}

/// The active symmetric key and its companion salt
pub struct PrimaryKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
    salt: [u8; SALT_SIZE],
}

impl PrimaryKey {
    /// Generate a fresh random key and salt pair
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self {
            key: cipher::generate_key_bytes()?,
            salt: cipher::generate_salt()?,
        })
    }

    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_ref()
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// Flatten to the key || salt record persisted in the key store
    fn to_record(&self) -> Zeroizing<Vec<u8>> {
        let mut record = Zeroizing::new(Vec::with_capacity(KEY_SIZE + SALT_SIZE));
        record.extend_from_slice(self.key.as_ref());
        record.extend_from_slice(&self.salt);
        record
    }

    fn from_record(record: &[u8]) -> Result<Self, KeyError> {
        if record.len() != KEY_SIZE + SALT_SIZE {
            return Err(KeyError::MalformedRecord {
                expected: KEY_SIZE + SALT_SIZE,
                actual: record.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&record[..KEY_SIZE]);
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&record[KEY_SIZE..]);
        Ok(Self { key, salt })
    }
}

/// Owns the primary key's persistence: load-or-create on startup, mint and
/// persist replacements during rotation
pub struct KeyManager {
    store: Box<dyn KeyStore>,
}

impl KeyManager {
    pub fn new(store: Box<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Load the persisted key, or generate and persist a fresh one if the
    /// store has no record yet
    pub fn load_or_create(&self) -> Result<PrimaryKey, KeyError> {
        match self.store.load() {
            Ok(record) => PrimaryKey::from_record(&record),
            Err(KeychainError::NotFound) => {
                let key = PrimaryKey::generate()?;
                self.persist(&key)?;
                tracing::info!("generated new primary key");
                Ok(key)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Generate a replacement key without persisting it. Rotation migrates
    /// every entry first and only then calls [`KeyManager::persist`].
    pub fn generate(&self) -> Result<PrimaryKey, KeyError> {
        PrimaryKey::generate()
    }

    pub fn persist(&self, key: &PrimaryKey) -> Result<(), KeyError> {
        self.store.save(&key.to_record())?;
        Ok(())
    }
}
