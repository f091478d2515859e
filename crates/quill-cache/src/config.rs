//! Cache capacity configuration

/// Bounds enforced after every write. Both triggers are independent: the
/// count bound caps documents + analyses combined, the byte bound caps the
/// sum of all ciphertext lengths.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_bytes: 100 * 1024 * 1024,
        }
    }
}
