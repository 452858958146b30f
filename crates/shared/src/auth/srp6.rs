// SRP6 - Secure Remote Password protocol, client side
//
// Implements the identity service's flavor of SRP-6a: SHA-256
// throughout, the RFC 5054 2048-bit group, and a PBKDF2-hardened
// password value in place of the plain SRP identity hash. The group
// parameters are fixed constants, never negotiated.

use once_cell::sync::Lazy;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use super::big_number::BigNumber;
use super::crypto_hash::{Sha256Hash, sha256};

/// RFC 5054 2048-bit safe prime (N)
pub const GROUP_PRIME_HEX: &str =
    "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050\
     A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50\
     E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8\
     55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B\
     CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748\
     544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6\
     AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6\
     94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

/// Generator (g) for the 2048-bit group
pub const GROUP_GENERATOR: u32 = 2;

/// Private ephemeral size in bytes
const EPHEMERAL_BYTES: usize = 32;

/// Width of the hardened password value in bytes
const HARDENED_PASSWORD_BYTES: usize = 32;

/// Fixed SRP group parameters
pub struct SrpGroup {
    pub n: BigNumber,
    pub g: BigNumber,
}

/// The 2048-bit group the remote service expects
pub static G_2048: Lazy<SrpGroup> = Lazy::new(|| {
    let mut n = BigNumber::new();
    n.set_hex_str(GROUP_PRIME_HEX);
    SrpGroup {
        n,
        g: BigNumber::from_u32(GROUP_GENERATOR),
    }
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrpError {
    #[error("entropy source failure: {0}")]
    EntropyFailure(String),
    #[error("invalid server public value")]
    InvalidServerValue,
    #[error("server proof verification failed")]
    ProofMismatch,
    #[error("password hardening failed")]
    KeyDerivationFailure,
}

/// Scrambling parameter u = H(A || B)
pub fn compute_u(a_pub: &[u8], b_pub: &[u8]) -> BigNumber {
    let mut sha = Sha256Hash::new();
    sha.update_data_bytes(a_pub);
    sha.update_data_bytes(b_pub);
    sha.finalize();
    BigNumber::from_bytes_be(sha.get_digest())
}

/// Multiplier parameter k = H(N || g), g left-padded to group width
pub fn compute_k(group: &SrpGroup) -> BigNumber {
    let n_bytes = group.n.as_byte_array(0);
    let g_padded = group.g.as_byte_array(n_bytes.len());

    let mut sha = Sha256Hash::new();
    sha.update_data_bytes(&n_bytes);
    sha.update_data_bytes(&g_padded);
    sha.finalize();
    BigNumber::from_bytes_be(sha.get_digest())
}

/// Client proof M1 = H(H(N) XOR H(g) || H(username) || salt || A || B || K)
pub fn compute_m1(
    group: &SrpGroup,
    a_pub: &[u8],
    b_pub: &[u8],
    key: &[u8],
    username: &str,
    salt: &[u8],
) -> [u8; 32] {
    let n_bytes = group.n.as_byte_array(0);
    let g_padded = group.g.as_byte_array(n_bytes.len());

    let n_hash = sha256(&n_bytes);
    let g_hash = sha256(&g_padded);
    let mut hash = n_hash;
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte ^= g_hash[i];
    }

    let mut sha = Sha256Hash::new();
    sha.update_data_bytes(&hash);
    sha.update_data_bytes(&sha256(username.as_bytes()));
    sha.update_data_bytes(salt);
    sha.update_data_bytes(a_pub);
    sha.update_data_bytes(b_pub);
    sha.update_data_bytes(key);
    sha.finalize();
    *sha.get_digest()
}

/// Server proof M2 = H(A || M1 || K)
pub fn compute_m2(a_pub: &[u8], m1: &[u8], key: &[u8]) -> [u8; 32] {
    let mut sha = Sha256Hash::new();
    sha.update_data_bytes(a_pub);
    sha.update_data_bytes(m1);
    sha.update_data_bytes(key);
    sha.finalize();
    *sha.get_digest()
}

/// Hardened password value x: PBKDF2-HMAC-SHA256 over the SHA-256 hash
/// of the password, with the salt and iteration count the server chose.
pub fn hardened_password(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; HARDENED_PASSWORD_BYTES]>, SrpError> {
    let password_hash = Zeroizing::new(sha256(password.as_bytes()));
    let mut out = Zeroizing::new([0u8; HARDENED_PASSWORD_BYTES]);
    pbkdf2::pbkdf2::<hmac::Hmac<sha2::Sha256>>(&password_hash[..], salt, iterations, &mut out[..])
        .map_err(|_| SrpError::KeyDerivationFailure)?;
    Ok(out)
}

/// Client state before the server's challenge arrives.
/// Owns the attempt's ephemeral key pair; consumed by
/// `derive_session_key` so it cannot serve a second attempt.
pub struct Srp6Client {
    a: Zeroizing<[u8; EPHEMERAL_BYTES]>,
    a_pub: BigNumber,
}

impl Srp6Client {
    /// Generate a fresh ephemeral key pair: random private exponent a,
    /// public value A = g^a mod N. Fails only if the entropy source does.
    pub fn generate() -> Result<Self, SrpError> {
        let mut a = Zeroizing::new([0u8; EPHEMERAL_BYTES]);
        OsRng
            .try_fill_bytes(&mut a[..])
            .map_err(|e| SrpError::EntropyFailure(e.to_string()))?;
        Ok(Self::from_private_exponent(a))
    }

    fn from_private_exponent(a: Zeroizing<[u8; EPHEMERAL_BYTES]>) -> Self {
        let a_bn = BigNumber::from_bytes_be(&a[..]);
        let a_pub = G_2048.g.mod_exp(&a_bn, &G_2048.n);
        Srp6Client { a, a_pub }
    }

    /// Public ephemeral A in minimal big-endian form
    pub fn public_ephemeral(&self) -> Vec<u8> {
        self.a_pub.as_byte_array(0)
    }

    /// Process the server challenge: derive the session key K and the
    /// client proof M1, and precompute the expected server proof M2.
    ///
    /// S = (B - k*g^x)^(a + u*x) mod N, K = H(S). The iteration count
    /// is always the server-supplied value.
    pub fn derive_session_key(
        self,
        b_pub: &[u8],
        salt: &[u8],
        iterations: u32,
        username: &str,
        password: &str,
    ) -> Result<Srp6Session, SrpError> {
        let group = &*G_2048;
        let b = BigNumber::from_bytes_be(b_pub);

        // SRP safeguard: a server value congruent to zero fixes S
        if (&b % &group.n).is_zero() {
            return Err(SrpError::InvalidServerValue);
        }

        let x_bytes = hardened_password(password, salt, iterations)?;
        let x = BigNumber::from_bytes_be(&x_bytes[..]);
        let a = BigNumber::from_bytes_be(&self.a[..]);

        let a_pub_bytes = self.a_pub.as_byte_array(0);
        let b_pub_bytes = b.as_byte_array(0);

        let u = compute_u(&a_pub_bytes, &b_pub_bytes);
        let k = compute_k(group);

        // S = (B - k*g^x)^(a + u*x) mod N, subtraction wrapped mod N
        let g_x = group.g.mod_exp(&x, &group.n);
        let interm = &(&k * &g_x) % &group.n;
        let base = &(&(&group.n + &b) - &interm) % &group.n;
        let exp = &a + &(&u * &x);
        let s = base.mod_exp(&exp, &group.n);

        let session_key = Zeroizing::new(sha256(&s.as_byte_array(0)));
        let client_proof = compute_m1(
            group,
            &a_pub_bytes,
            &b_pub_bytes,
            &session_key[..],
            username,
            salt,
        );
        let expected_server_proof = compute_m2(&a_pub_bytes, &client_proof, &session_key[..]);

        Ok(Srp6Session {
            session_key,
            client_proof,
            expected_server_proof,
        })
    }
}

/// Completed key exchange: session key plus both proofs.
/// The session key outlives proof verification because payload
/// decryption and token issuance derive from it.
#[derive(Debug)]
pub struct Srp6Session {
    session_key: Zeroizing<[u8; 32]>,
    client_proof: [u8; 32],
    expected_server_proof: [u8; 32],
}

impl Srp6Session {
    /// Session key K
    pub fn session_key(&self) -> &[u8] {
        &self.session_key[..]
    }

    /// Client proof M1 to send with the completion request
    pub fn client_proof(&self) -> &[u8; 32] {
        &self.client_proof
    }

    /// Verify the server's proof M2 in constant time.
    /// A mismatch is a tampering/MITM signal; the attempt must abort.
    pub fn verify_server_proof(&self, m2: &[u8]) -> Result<(), SrpError> {
        if self.expected_server_proof[..].ct_eq(m2).into() {
            Ok(())
        } else {
            Err(SrpError::ProofMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERNAME: &str = "alice@example.com";
    const PASSWORD: &str = "correct horse battery staple";
    const ITERATIONS: u32 = 20309;

    fn test_salt() -> Vec<u8> {
        (0u8..16).collect()
    }

    fn fixed_client() -> Srp6Client {
        let mut a = Zeroizing::new([0u8; 32]);
        for (i, byte) in a.iter_mut().enumerate() {
            *byte = (i + 1) as u8;
        }
        Srp6Client::from_private_exponent(a)
    }

    /// Server-side half of the exchange, for honest-server simulation
    fn server_challenge(b_priv: &BigNumber, x: &BigNumber) -> BigNumber {
        let group = &*G_2048;
        let k = compute_k(group);
        let v = group.g.mod_exp(x, &group.n);
        let g_b = group.g.mod_exp(b_priv, &group.n);
        &(&(&(&k * &v) % &group.n) + &g_b) % &group.n
    }

    #[test]
    fn test_vector_client_proof() {
        let client = fixed_client();
        let salt = test_salt();

        let x_bytes = hardened_password(PASSWORD, &salt, ITERATIONS).unwrap();
        let x = BigNumber::from_bytes_be(&x_bytes[..]);
        let mut b_priv_bytes = [0u8; 32];
        for (i, byte) in b_priv_bytes.iter_mut().enumerate() {
            *byte = (i + 33) as u8;
        }
        let b_priv = BigNumber::from_bytes_be(&b_priv_bytes);
        let b_pub = server_challenge(&b_priv, &x);

        let session = client
            .derive_session_key(&b_pub.as_byte_array(0), &salt, ITERATIONS, USERNAME, PASSWORD)
            .unwrap();

        // Precomputed with an independent implementation of the same math
        assert_eq!(
            data_encoding::HEXLOWER.encode(session.session_key()),
            "bc79c5dbe4f7424b08b752fe671e543343b0701b93d1a19534d00f4fbfcd5730"
        );
        assert_eq!(
            data_encoding::HEXLOWER.encode(session.client_proof()),
            "9f73a60eff1c45724693a9313ae07664f9cb6d49b4d00c5e134bc9e35d05e40a"
        );

        // Honest-server M2 = H(A || M1 || K) must verify
        let m2 = data_encoding::HEXLOWER
            .decode(b"d5493d8d66a71a58e679c3e20b96f775880856e38afc41978c58b535258e3bc9")
            .unwrap();
        session.verify_server_proof(&m2).unwrap();
    }

    #[test]
    fn test_wrong_password_changes_proof() {
        let salt = test_salt();

        let x_bytes = hardened_password(PASSWORD, &salt, ITERATIONS).unwrap();
        let x = BigNumber::from_bytes_be(&x_bytes[..]);
        let b_priv = BigNumber::from_u32(0xB00B5);
        let b_pub = server_challenge(&b_priv, &x);
        let b_pub_bytes = b_pub.as_byte_array(0);

        let good = fixed_client()
            .derive_session_key(&b_pub_bytes, &salt, ITERATIONS, USERNAME, PASSWORD)
            .unwrap();
        let bad = fixed_client()
            .derive_session_key(&b_pub_bytes, &salt, ITERATIONS, USERNAME, "tr0ub4dor&3")
            .unwrap();

        assert_ne!(good.client_proof(), bad.client_proof());

        // The honest server, knowing the real verifier, rejects the bad proof
        let group = &*G_2048;
        let a_pub = fixed_client().public_ephemeral();
        let u = compute_u(&a_pub, &b_pub_bytes);
        let v = group.g.mod_exp(&x, &group.n);
        let s_server = (&(&BigNumber::from_bytes_be(&a_pub) * &v.mod_exp(&u, &group.n))
            % &group.n)
            .mod_exp(&b_priv, &group.n);
        let key = sha256(&s_server.as_byte_array(0));
        let expected_m1 = compute_m1(group, &a_pub, &b_pub_bytes, &key, USERNAME, &salt);
        assert_ne!(&expected_m1, bad.client_proof());
    }

    #[test]
    fn test_rejects_zero_server_value() {
        let client = fixed_client();
        let err = client
            .derive_session_key(&[0u8; 256], &test_salt(), ITERATIONS, USERNAME, PASSWORD)
            .unwrap_err();
        assert_eq!(err, SrpError::InvalidServerValue);
    }

    #[test]
    fn test_rejects_server_value_multiple_of_n() {
        let client = fixed_client();
        let n_bytes = G_2048.n.as_byte_array(0);
        let err = client
            .derive_session_key(&n_bytes, &test_salt(), ITERATIONS, USERNAME, PASSWORD)
            .unwrap_err();
        assert_eq!(err, SrpError::InvalidServerValue);
    }

    #[test]
    fn test_tampered_server_proof_fails() {
        let salt = test_salt();
        let x_bytes = hardened_password(PASSWORD, &salt, ITERATIONS).unwrap();
        let x = BigNumber::from_bytes_be(&x_bytes[..]);
        let b_pub = server_challenge(&BigNumber::from_u32(7777), &x);

        let session = fixed_client()
            .derive_session_key(&b_pub.as_byte_array(0), &salt, ITERATIONS, USERNAME, PASSWORD)
            .unwrap();

        let a_pub = fixed_client().public_ephemeral();
        let mut m2 = compute_m2(&a_pub, session.client_proof(), session.session_key());
        m2[0] ^= 0x01;
        assert_eq!(
            session.verify_server_proof(&m2).unwrap_err(),
            SrpError::ProofMismatch
        );
    }

    #[test]
    fn test_fresh_ephemeral_per_attempt() {
        let first = Srp6Client::generate().unwrap();
        let second = Srp6Client::generate().unwrap();
        assert_ne!(first.public_ephemeral(), second.public_ephemeral());
    }
}
