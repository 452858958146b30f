// CryptoHash - SHA-256 hash wrapper
// The handshake hashes byte strings and group elements interchangeably,
// so the wrapper accepts both.

use super::big_number::BigNumber;
use digest::Digest;

/// Streaming SHA-256 wrapper used throughout the SRP exchange
#[derive(Clone)]
pub struct Sha256Hash {
    hasher: sha2::Sha256,
    digest: [u8; 32],
}

impl Default for Sha256Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256Hash {
    pub const DIGEST_LENGTH: usize = 32;

    pub fn new() -> Self {
        Sha256Hash {
            hasher: sha2::Sha256::new(),
            digest: [0u8; 32],
        }
    }

    /// Re-initialize the hasher
    pub fn initialize(&mut self) {
        self.hasher = sha2::Sha256::new();
    }

    /// Update with raw bytes
    pub fn update_data_bytes(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Update with a string
    pub fn update_data(&mut self, data: &str) {
        self.hasher.update(data.as_bytes());
    }

    /// Update with BigNumber values
    /// Each value contributes its minimal big-endian byte form
    pub fn update_big_numbers(&mut self, numbers: &[&BigNumber]) {
        for bn in numbers {
            let bytes = bn.as_byte_array(0);
            self.update_data_bytes(&bytes);
        }
    }

    /// Finalize the hash computation
    pub fn finalize(&mut self) {
        let result = self.hasher.clone().finalize();
        self.digest.copy_from_slice(&result);
    }

    /// Get the computed digest
    pub fn get_digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub const fn get_length() -> usize {
        Self::DIGEST_LENGTH
    }
}

/// One-shot SHA-256
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&sha2::Sha256::digest(data));
    digest
}
