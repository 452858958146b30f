// Auth module - cryptographic primitives for the identity-service handshake

pub mod big_number;
pub mod crypto_hash;
pub mod hmac_sha256;
pub mod payload_crypto;
pub mod srp6;

pub use big_number::BigNumber;
pub use crypto_hash::Sha256Hash;
pub use hmac_sha256::{HmacSha256, hmac_sha256};
pub use payload_crypto::CryptoError;
pub use srp6::{Srp6Client, Srp6Session, SrpError};
