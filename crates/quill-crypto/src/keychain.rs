//! Secure key store integration
//!
//! The primary key never touches disk in the clear: it lives in the OS
//! keychain as a single record holding hex(key || salt). A [`KeyStore`]
//! trait sits in front of `keyring` so tests (and embedders that bring
//! their own secret store) can swap the backend.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeychainError {
    #[error("Key not found in secure storage")]
    NotFound,
    #[error("Secure storage error: {0}")]
    Platform(String),
}

/// Opaque persistence for the primary key material
pub trait KeyStore: Send + Sync {
    fn load(&self) -> Result<Vec<u8>, KeychainError>;
    fn save(&self, material: &[u8]) -> Result<(), KeychainError>;
    fn delete(&self) -> Result<(), KeychainError>;
}

impl<T: KeyStore + ?Sized> KeyStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Vec<u8>, KeychainError> {
        (**self).load()
    }
    fn save(&self, material: &[u8]) -> Result<(), KeychainError> {
        (**self).save(material)
    }
    fn delete(&self) -> Result<(), KeychainError> {
        (**self).delete()
    }
}

/// OS keychain backed store (macOS Keychain, Windows Credential Manager,
/// Secret Service on Linux)
pub struct KeychainStore {
    service_name: String,
    account: String,
}

impl KeychainStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            account: "primary_encryption_key".to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeychainError> {
        keyring::Entry::new(&self.service_name, &self.account)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

impl KeyStore for KeychainStore {
    fn load(&self) -> Result<Vec<u8>, KeychainError> {
        let encoded = self.entry()?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            _ => KeychainError::Platform(e.to_string()),
        })?;
        (0..encoded.len())
            .step_by(2)
            .map(|i| {
                encoded
                    .get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| KeychainError::Platform("corrupt key record".to_string()))
            })
            .collect()
    }

    fn save(&self, material: &[u8]) -> Result<(), KeychainError> {
        let encoded: String = material.iter().map(|b| format!("{:02x}", b)).collect();
        self.entry()?
            .set_password(&encoded)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }

    fn delete(&self) -> Result<(), KeychainError> {
        self.entry()?.delete_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            _ => KeychainError::Platform(e.to_string()),
        })
    }
}

/// In-memory store for tests and ephemeral caches
#[derive(Default)]
pub struct MemoryKeyStore {
    material: std::sync::Mutex<Option<Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> Result<Vec<u8>, KeychainError> {
        self.material
            .lock()
            .map_err(|e| KeychainError::Platform(e.to_string()))?
            .clone()
            .ok_or(KeychainError::NotFound)
    }

    fn save(&self, material: &[u8]) -> Result<(), KeychainError> {
        *self
            .material
            .lock()
            .map_err(|e| KeychainError::Platform(e.to_string()))? = Some(material.to_vec());
        Ok(())
    }

    fn delete(&self) -> Result<(), KeychainError> {
        self.material
            .lock()
            .map_err(|e| KeychainError::Platform(e.to_string()))?
            .take()
            .map(|_| ())
            .ok_or(KeychainError::NotFound)
    }
}
