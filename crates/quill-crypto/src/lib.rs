//! Quill Crypto - encryption and key lifecycle layer
//!
//! This crate provides:
//! - ChaCha20-Poly1305 authenticated encryption for cached artifacts
//! - Hardware keychain integration for the primary key
//! - Key generation, load-or-create, and rotation plumbing

pub mod cipher;
pub mod keychain;
pub mod keys;

pub use cipher::{CipherError, KEY_SIZE, NONCE_SIZE, SALT_SIZE};
pub use keychain::{KeyStore, KeychainError, KeychainStore, MemoryKeyStore};
pub use keys::{KeyError, KeyManager, PrimaryKey};
