// HMAC-SHA256 wrapper
// Keyed hashing for subkey derivation and per-app request checksums.

use super::big_number::BigNumber;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256Inner = Hmac<Sha256>;

pub struct HmacSha256 {
    mac: HmacSha256Inner,
    digest: [u8; 32],
}

impl HmacSha256 {
    pub const DIGEST_LENGTH: usize = 32;

    /// Create a new HMAC-SHA256 with the given key
    pub fn new(key: &[u8]) -> Self {
        HmacSha256 {
            mac: HmacSha256Inner::new_from_slice(key)
                .expect("HMAC-SHA256 key can be any length"),
            digest: [0u8; 32],
        }
    }

    /// Update with BigNumber data
    pub fn update_big_number(&mut self, bn: &BigNumber) {
        let data = bn.as_byte_array(0);
        self.update_data(&data);
    }

    /// Update with raw bytes
    pub fn update_data(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Update with a string
    pub fn update_string(&mut self, data: &str) {
        self.mac.update(data.as_bytes());
    }

    /// Finalize and compute the MAC
    pub fn finalize(&mut self) {
        let result = self.mac.clone().finalize();
        self.digest.copy_from_slice(&result.into_bytes());
    }

    /// Get the computed digest
    pub fn get_digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub const fn get_length() -> usize {
        Self::DIGEST_LENGTH
    }
}

/// Compute HMAC-SHA256 in one shot
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256Inner::new_from_slice(key)
        .expect("HMAC-SHA256 key can be any length");
    mac.update(data);
    let result = mac.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result.into_bytes());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256() {
        let key = b"secret";
        let data = b"message";
        let result = hmac_sha256(key, data);
        assert_eq!(result.len(), 32);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut mac = HmacSha256::new(b"key");
        mac.update_data(b"mes");
        mac.update_data(b"sage");
        mac.finalize();
        assert_eq!(mac.get_digest(), &hmac_sha256(b"key", b"message"));
    }
}
