// BigNumber - Large integer arithmetic wrapper
// Wraps num-bigint's BigUint for the SRP-6a group math.
//
// The identity service exchanges group elements as big-endian byte
// strings (base64 on the wire), so all conversions here are big-endian.
// `as_byte_array(0)` yields the minimal representation; a nonzero
// min_size left-pads with zero bytes up to that width.

use num_bigint::BigUint;
use num_traits::Zero;

#[derive(Debug, Clone)]
pub struct BigNumber {
    bn: BigUint,
}

impl Default for BigNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl BigNumber {
    /// Create a new BigNumber initialized to zero
    pub fn new() -> Self {
        BigNumber { bn: BigUint::zero() }
    }

    /// Create from a u32 value
    pub fn from_u32(val: u32) -> Self {
        BigNumber { bn: BigUint::from(val) }
    }

    /// Create from binary data in big-endian order
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        BigNumber {
            bn: BigUint::from_bytes_be(bytes),
        }
    }

    /// Set from a hex string (big-endian)
    /// Returns the number of characters processed, 0 on error
    pub fn set_hex_str(&mut self, hex: &str) -> usize {
        let hex = hex.trim();
        if hex.is_empty() {
            return 0;
        }
        match BigUint::parse_bytes(hex.as_bytes(), 16) {
            Some(val) => {
                self.bn = val;
                hex.len()
            }
            None => 0,
        }
    }

    /// Check if the number is zero
    pub fn is_zero(&self) -> bool {
        self.bn.is_zero()
    }

    /// Modular exponentiation: self^exp mod modulus
    pub fn mod_exp(&self, exp: &BigNumber, modulus: &BigNumber) -> BigNumber {
        BigNumber {
            bn: self.bn.modpow(&exp.bn, &modulus.bn),
        }
    }

    /// Get the number of bytes needed to represent this number
    pub fn get_num_bytes(&self) -> usize {
        let bits = self.bn.bits() as usize;
        bits.div_ceil(8)
    }

    /// Get as a u32 value
    pub fn as_dword(&self) -> u32 {
        use num_traits::ToPrimitive;
        self.bn.to_u32().unwrap_or(0)
    }

    /// Convert to a big-endian byte array, left-padded with zeros to
    /// min_size. min_size of 0 gives the minimal representation.
    pub fn as_byte_array(&self, min_size: usize) -> Vec<u8> {
        let be_bytes = self.bn.to_bytes_be();
        let length = if min_size > be_bytes.len() {
            min_size
        } else {
            be_bytes.len()
        };

        let mut result = vec![0u8; length];
        let padding_offset = length - be_bytes.len();
        result[padding_offset..].copy_from_slice(&be_bytes);
        result
    }

    /// Convert to hex string (uppercase)
    pub fn as_hex_str(&self) -> String {
        if self.bn.is_zero() {
            return "0".to_string();
        }
        format!("{:X}", self.bn)
    }

    /// Get a reference to the inner BigUint
    pub fn inner(&self) -> &BigUint {
        &self.bn
    }
}

// Arithmetic operator implementations

impl std::ops::Add for &BigNumber {
    type Output = BigNumber;
    fn add(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn + &rhs.bn,
        }
    }
}

impl std::ops::Sub for &BigNumber {
    type Output = BigNumber;
    fn sub(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: if self.bn >= rhs.bn {
                &self.bn - &rhs.bn
            } else {
                BigUint::zero()
            },
        }
    }
}

impl std::ops::Mul for &BigNumber {
    type Output = BigNumber;
    fn mul(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn * &rhs.bn,
        }
    }
}

impl std::ops::Rem for &BigNumber {
    type Output = BigNumber;
    fn rem(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn % &rhs.bn,
        }
    }
}

impl PartialEq for BigNumber {
    fn eq(&self, other: &Self) -> bool {
        self.bn == other.bn
    }
}

impl Eq for BigNumber {}

impl PartialOrd for BigNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNumber {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bn.cmp(&other.bn)
    }
}
