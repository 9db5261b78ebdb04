//! 256-bit amounts and decimal unit formatting.

use core::fmt;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// ENS token decimals.
pub const TOKEN_DECIMALS: u32 = 18;

/// ETH decimals.
pub const ETH_DECIMALS: u32 = 18;

/// Minimum ETH balance needed for the delegate transaction: 0.001 ETH.
///
/// A balance must be strictly greater than this to count as sufficient.
pub const GAS_THRESHOLD_WEI: u64 = 1_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid digits in quantity: {0}")]
    InvalidDigits(String),
    #[error("quantity exceeds 256 bits")]
    Overflow,
}

/// Unsigned integer bounded to 256 bits.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256(BigUint);

impl U256 {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_biguint(value: BigUint) -> Result<Self, QuantityError> {
        if value.bits() > 256 {
            return Err(QuantityError::Overflow);
        }
        Ok(Self(value))
    }

    /// Parse a JSON-RPC hex quantity such as `"0x1a"`. `"0x"` and `"0x0"`
    /// are both zero.
    pub fn from_hex_quantity(s: &str) -> Result<Self, QuantityError> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if stripped.is_empty() {
            if s.is_empty() {
                return Err(QuantityError::Empty);
            }
            return Ok(Self::zero());
        }
        let value = BigUint::parse_bytes(stripped.as_bytes(), 16)
            .ok_or_else(|| QuantityError::InvalidDigits(s.to_string()))?;
        Self::from_biguint(value)
    }

    pub fn from_dec_str(s: &str) -> Result<Self, QuantityError> {
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| QuantityError::InvalidDigits(s.to_string()))?;
        Self::from_biguint(value)
    }

    /// Decode a big-endian ABI word (at most 32 bytes).
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, QuantityError> {
        Self::from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Saturating product, used for gas cost (`gas * price`).
    pub fn saturating_mul(&self, other: &U256) -> U256 {
        let product = &self.0 * &other.0;
        if product.bits() > 256 {
            U256((BigUint::from(1u8) << 256u32) - 1u8)
        } else {
            U256(product)
        }
    }

    /// Lossy conversion to a float amount in whole units.
    pub fn to_f64_units(&self, decimals: u32) -> f64 {
        let raw = self.0.to_f64().unwrap_or(f64::MAX);
        raw / 10f64.powi(decimals as i32)
    }
}

impl From<u64> for U256 {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self.0)
    }
}

impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.starts_with("0x") || s.starts_with("0X") {
            U256::from_hex_quantity(&s)
        } else {
            U256::from_dec_str(&s)
        }
        .map_err(serde::de::Error::custom)
    }
}

/// Format a raw integer amount with `decimals` fractional digits.
///
/// Trailing fractional zeros are dropped, so `10^18` with 18 decimals is
/// `"1"` and `15 * 10^17` is `"1.5"`.
pub fn format_units(value: &U256, decimals: u32) -> String {
    let digits = value.0.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let (whole, frac) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };

    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole
    } else {
        format!("{}.{}", whole, frac)
    }
}
