// PayloadCrypto - session-key derived decryption of server payloads
//
// The SRP session key never encrypts anything directly. The service
// derives per-purpose subkeys from it with HMAC-SHA256 over fixed
// context labels and seals the completion payload with AES-256-CBC.
// App tokens arrive under AES-256-GCM keyed by the opaque `sk` value
// carried inside the secure payload.

use aes::Aes256;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{AesGcm, Nonce};
use thiserror::Error;

use super::hmac_sha256::{HmacSha256, hmac_sha256};

/// Context label for the payload encryption key subkey
pub const EXTRA_DATA_KEY: &str = "extra data key:";

/// Context label for the payload IV subkey
pub const EXTRA_DATA_IV: &str = "extra data iv:";

/// Fixed tag mixed into per-app checksums
pub const APP_TOKENS_TAG: &str = "apptokens";

const CBC_BLOCK_LEN: usize = 16;
const AEAD_VERSION_LEN: usize = 3;
const AEAD_IV_LEN: usize = 16;
const AEAD_TAG_LEN: usize = 16;
const AEAD_MIN_LEN: usize = AEAD_VERSION_LEN + AEAD_IV_LEN + AEAD_TAG_LEN;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Every decryption failure collapses into this one kind so callers
/// (and logs) cannot become a padding or tag oracle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("payload decryption failed")]
    DecryptionFailed,
}

/// Derive a 32-byte subkey: HMAC-SHA256 over the fixed ASCII context
/// label, keyed by the SRP session key. Deterministic.
pub fn derive_subkey(session_key: &[u8], label: &str) -> [u8; 32] {
    hmac_sha256(session_key, label.as_bytes())
}

/// Decrypt the completion payload: AES-256-CBC with the derived key
/// and the first 16 bytes of the derived IV subkey, then strip PKCS#7
/// padding. The padding byte must fall in [1, 16].
pub fn decrypt_secure_payload(
    session_key: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % CBC_BLOCK_LEN != 0 {
        return Err(CryptoError::DecryptionFailed);
    }

    let key = derive_subkey(session_key, EXTRA_DATA_KEY);
    let iv_subkey = derive_subkey(session_key, EXTRA_DATA_IV);
    let iv = &iv_subkey[..CBC_BLOCK_LEN];

    let decryptor =
        Aes256CbcDec::new_from_slices(&key, iv).map_err(|_| CryptoError::DecryptionFailed)?;

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let pad = *plaintext.last().ok_or(CryptoError::DecryptionFailed)? as usize;
    if pad == 0 || pad > CBC_BLOCK_LEN || pad > plaintext.len() {
        return Err(CryptoError::DecryptionFailed);
    }
    Ok(plaintext[..plaintext.len() - pad].to_vec())
}

/// Decrypt an AEAD token blob laid out as
/// [3-byte format version][16-byte IV][ciphertext][16-byte tag].
/// The version prefix is authenticated as associated data and the tag
/// is checked in constant time; no partial plaintext ever escapes.
pub fn decrypt_aead_payload(session_key: &[u8], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < AEAD_MIN_LEN {
        return Err(CryptoError::DecryptionFailed);
    }

    let (version, rest) = blob.split_at(AEAD_VERSION_LEN);
    let (iv, ciphertext_and_tag) = rest.split_at(AEAD_IV_LEN);

    let cipher =
        Aes256Gcm16::new_from_slice(session_key).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(
            Nonce::<U16>::from_slice(iv),
            Payload {
                msg: ciphertext_and_tag,
                aad: version,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Proof of session possession for an app token request:
/// HMAC-SHA256 keyed by the raw session key over the fixed tag, the
/// device identifier, and the application identifier, in that order.
pub fn compute_app_checksum(session_key: &[u8], device_id: &str, app: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new(session_key);
    mac.update_string(APP_TOKENS_TAG);
    mac.update_string(device_id);
    mac.update_string(app);
    mac.finalize();
    *mac.get_digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;
    use aes::cipher::block_padding::Pkcs7;

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    fn session_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }
        key
    }

    fn cbc_encrypt(session_key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let key = derive_subkey(session_key, EXTRA_DATA_KEY);
        let iv_subkey = derive_subkey(session_key, EXTRA_DATA_IV);
        Aes256CbcEnc::new_from_slices(&key, &iv_subkey[..16])
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    fn gcm_encrypt(session_key: &[u8], version: &[u8; 3], plaintext: &[u8]) -> Vec<u8> {
        let iv = [0x42u8; 16];
        let cipher = Aes256Gcm16::new_from_slice(session_key).unwrap();
        let sealed = cipher
            .encrypt(
                Nonce::<U16>::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: version,
                },
            )
            .unwrap();
        let mut blob = version.to_vec();
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&sealed);
        blob
    }

    #[test]
    fn test_subkeys_distinct_per_label() {
        let sk = session_key();
        assert_ne!(
            derive_subkey(&sk, EXTRA_DATA_KEY),
            derive_subkey(&sk, EXTRA_DATA_IV)
        );
    }

    #[test]
    fn test_cbc_round_trip_partial_block() {
        let sk = session_key();
        let plaintext = b"{\"adsid\":\"12345\"}";
        let ciphertext = cbc_encrypt(&sk, plaintext);
        assert_eq!(decrypt_secure_payload(&sk, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_cbc_round_trip_block_boundaries() {
        let sk = session_key();
        // 0- and 16-byte remainders: full padding block cases
        for len in [0usize, 16, 32] {
            let plaintext = vec![0xA5u8; len];
            let ciphertext = cbc_encrypt(&sk, &plaintext);
            assert_eq!(
                decrypt_secure_payload(&sk, &ciphertext).unwrap(),
                plaintext,
                "length {len}"
            );
        }
    }

    #[test]
    fn test_cbc_rejects_non_block_length() {
        let sk = session_key();
        assert_eq!(
            decrypt_secure_payload(&sk, &[0u8; 17]).unwrap_err(),
            CryptoError::DecryptionFailed
        );
        assert_eq!(
            decrypt_secure_payload(&sk, &[]).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_cbc_rejects_bad_padding_byte() {
        let sk = session_key();
        let mut ciphertext = cbc_encrypt(&sk, b"four");
        // Corrupt the last ciphertext block so the padding byte decrypts
        // out of range with overwhelming probability
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        let result = decrypt_secure_payload(&sk, &ciphertext);
        if let Ok(plaintext) = result {
            // Rare survivable corruption still must not return the original
            assert_ne!(plaintext, b"four");
        }
    }

    #[test]
    fn test_aead_round_trip() {
        let sk = session_key();
        let blob = gcm_encrypt(&sk, b"\x00\x00\x01", b"token record data");
        assert_eq!(
            decrypt_aead_payload(&sk, &blob).unwrap(),
            b"token record data"
        );
    }

    #[test]
    fn test_aead_rejects_short_blob() {
        let sk = session_key();
        assert_eq!(
            decrypt_aead_payload(&sk, &[0u8; 34]).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_aead_rejects_flipped_tag_bit() {
        let sk = session_key();
        let mut blob = gcm_encrypt(&sk, b"\x00\x00\x01", b"token record data");
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert_eq!(
            decrypt_aead_payload(&sk, &blob).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_aead_authenticates_version_prefix() {
        let sk = session_key();
        let mut blob = gcm_encrypt(&sk, b"\x00\x00\x01", b"token record data");
        blob[0] ^= 0x01;
        assert_eq!(
            decrypt_aead_payload(&sk, &blob).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_checksum_deterministic_and_input_sensitive() {
        let sk = session_key();
        let base = compute_app_checksum(&sk, "12345", "com.example.tool");
        assert_eq!(base, compute_app_checksum(&sk, "12345", "com.example.tool"));
        assert_ne!(base, compute_app_checksum(&sk, "12346", "com.example.tool"));
        assert_ne!(base, compute_app_checksum(&sk, "12345", "com.example.other"));

        let mut other_key = sk;
        other_key[0] ^= 0x80;
        assert_ne!(base, compute_app_checksum(&other_key, "12345", "com.example.tool"));
    }
}
