//! Encrypted backup packaging
//!
//! A backup is the full `(CacheKey, EncryptedEntry)` content of both maps,
//! metadata included, serialized and then encrypted as one buffer under the
//! current primary key. The outer package is self-describing: it carries
//! the nonce, the key's salt, and a format version so import can refuse
//! blobs it does not understand.

use quill_crypto::cipher::{self, NONCE_SIZE};
use quill_crypto::PrimaryKey;
use serde::{Deserialize, Serialize};

use crate::entry::{CacheKey, EncryptedEntry};
use crate::error::CacheError;

pub const FORMAT_VERSION: &str = "2.0";

#[derive(Serialize, Deserialize)]
pub struct BackupPackage {
    pub encrypted_payload: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub salt: Vec<u8>,
    pub format_version: String,
}

/// Plaintext interior of a backup: everything needed for a true round trip
#[derive(Serialize, Deserialize)]
pub(crate) struct BackupPayload {
    pub documents: Vec<(CacheKey, EncryptedEntry)>,
    pub analyses: Vec<(CacheKey, EncryptedEntry)>,
}

pub(crate) fn write_package(
    payload: &BackupPayload,
    key: &PrimaryKey,
) -> Result<Vec<u8>, CacheError> {
    let plaintext = serde_json::to_vec(payload)?;
    let (encrypted_payload, nonce) = cipher::encrypt(&plaintext, key.key_bytes())?;

    let package = BackupPackage {
        encrypted_payload,
        nonce,
        salt: key.salt().to_vec(),
        format_version: FORMAT_VERSION.to_string(),
    };
    Ok(serde_json::to_vec(&package)?)
}

pub(crate) fn read_package(bytes: &[u8], key: &PrimaryKey) -> Result<BackupPayload, CacheError> {
    let package: BackupPackage = serde_json::from_slice(bytes)
        .map_err(|e| CacheError::InvalidBackup(format!("unreadable envelope: {e}")))?;

    if package.format_version != FORMAT_VERSION {
        return Err(CacheError::InvalidBackup(format!(
            "unsupported format version {}",
            package.format_version
        )));
    }

    let plaintext = cipher::decrypt(&package.encrypted_payload, &package.nonce, key.key_bytes())
        .map_err(|_| {
            CacheError::InvalidBackup("payload does not decrypt under the current key".to_string())
        })?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| CacheError::InvalidBackup(format!("corrupt payload: {e}")))
}
