//! Content hashing used to identify duplicate resources.
//!
//! Hashing is a black-box service to the packing engine: the scan phase asks a
//! [`ContentHasher`] for each concrete file and stores whatever string it
//! returns. [`SkipHashing`] is used when hash generation is disabled.

use std::io::Read;
use std::path::Path;

use xxhash_rust::xxh3::Xxh3;

use crate::constants::HASH_BUFFER_SIZE;

/// Service computing a content hash for a file on disk.
pub trait ContentHasher: Send + Sync {
    /// Hash the contents of a file.
    ///
    /// # Arguments
    /// * `path` - Path to the file to hash
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    fn hash_file(&self, path: &Path) -> Result<String, std::io::Error>;
}

/// XXH128 content hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3ContentHasher;

impl ContentHasher for Xxh3ContentHasher {
    fn hash_file(&self, path: &Path) -> Result<String, std::io::Error> {
        let mut file: std::fs::File = std::fs::File::open(path)?;
        let mut hasher: Xxh3Hasher = Xxh3Hasher::new();
        let mut buffer: Vec<u8> = vec![0u8; HASH_BUFFER_SIZE];

        loop {
            let bytes_read: usize = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finish_hex())
    }
}

/// Hasher used when hash generation is turned off; always returns `""`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipHashing;

impl ContentHasher for SkipHashing {
    fn hash_file(&self, _path: &Path) -> Result<String, std::io::Error> {
        Ok(String::new())
    }
}

/// Compute XXH128 hash of a byte slice.
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:032x}", xxhash_rust::xxh3::xxh3_128(data))
}

/// Combine per-file hashes into one hash for a file set.
///
/// A single hash is returned unchanged; an empty set (or a set of empty
/// hashes) yields an empty string.
///
/// # Arguments
/// * `hashes` - Per-file hashes in file order
pub fn combine_hashes<S: AsRef<str>>(hashes: &[S]) -> String {
    match hashes {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        many => {
            if many.iter().all(|h| h.as_ref().is_empty()) {
                return String::new();
            }
            let joined: String = many.iter().map(|h| format!("{}\n", h.as_ref())).collect();
            hash_bytes(joined.as_bytes())
        }
    }
}

/// Streaming hasher for incremental XXH128 hashing.
pub struct Xxh3Hasher {
    inner: Xxh3,
}

impl Xxh3Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    /// Update the hasher with additional data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash as 32-char hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:032x}", self.inner.digest128())
    }
}

impl Default for Xxh3Hasher {
    fn default() -> Self {
        Self::new()
    }
}
