//! ChaCha20-Poly1305 authenticated encryption
//!
//! Why ChaCha20-Poly1305?
//! - Constant-time (no timing attacks)
//! - No weak keys
//! - Faster than AES on systems without AES-NI
//! - Used by TLS 1.3, WireGuard, Signal
//!
//! The Poly1305 tag rides inside the ciphertext, so a single flipped bit
//! anywhere in the ciphertext (or a wrong key) fails decryption outright
//! instead of returning garbage plaintext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ring::rand::SecureRandom;
use thiserror::Error;
use zeroize::Zeroizing;

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 96-bit nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;
/// 256-bit salt persisted alongside the key (32 bytes)
pub const SALT_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed - data may be corrupted or tampered")]
    DecryptionFailed,

    #[error("Random generator unavailable")]
    RngFailure,

    #[error("Invalid key size: expected {KEY_SIZE}, got {0}")]
    InvalidKeySize(usize),
}

/// Generate cryptographically secure random key material
pub fn generate_key_bytes() -> Result<Zeroizing<[u8; KEY_SIZE]>, CipherError> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    ring::rand::SystemRandom::new()
        .fill(key.as_mut())
        .map_err(|_| CipherError::RngFailure)?;
    Ok(key)
}

/// Generate a random salt to persist alongside the key
pub fn generate_salt() -> Result<[u8; SALT_SIZE], CipherError> {
    let mut salt = [0u8; SALT_SIZE];
    ring::rand::SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| CipherError::RngFailure)?;
    Ok(salt)
}

/// Encrypt plaintext with ChaCha20-Poly1305
///
/// Returns `(ciphertext || tag, nonce)`. A fresh random nonce is drawn per
/// call; callers store it next to the ciphertext.
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKeySize(key.len()));
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CipherError::InvalidKeySize(key.len()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    ring::rand::SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| CipherError::RngFailure)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt ciphertext produced by [`encrypt`]
///
/// Fails if the tag does not verify: wrong key, tampered bytes, or a nonce
/// that does not belong to this ciphertext.
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &[u8],
    key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKeySize(key.len()));
    }

    if nonce.len() != NONCE_SIZE {
        return Err(CipherError::DecryptionFailed);
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CipherError::InvalidKeySize(key.len()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

/// Hex-encoded SHA-256 digest, used as the plaintext integrity checksum
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, data);
    digest.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
}
