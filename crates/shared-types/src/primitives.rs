//! # Primitive Value Objects
//!
//! Identifiers and amounts used by every Circles entity.
//!
//! - [`Address`]: 20-byte account/contract address, lowercase hex text form
//! - [`TxHash`]: 32-byte transaction hash (also used for metadata digests)
//! - [`SignedAmount`]: signed 256-bit magnitude for balances that may dip
//!   below zero when indexing starts mid-history

use crate::errors::ValueParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], ValueParseError> {
    let stripped = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let bytes = hex::decode(stripped).map_err(|e| ValueParseError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ValueParseError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte Ethereum-style address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero-sentinel address: mint source and burn sink.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero-sentinel address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The address interpreted as a big-endian unsigned integer.
    ///
    /// Hub V2 uses this value, in decimal, as the ERC-1155 id of the
    /// avatar's personal or group token.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Decimal token id derived from this address (Hub V2 convention).
    #[must_use]
    pub fn to_token_id(&self) -> String {
        self.to_u256().to_string()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// TRANSACTION HASH (32 bytes)
// =============================================================================

/// A 32-byte hash: transaction hashes, safe transaction hashes and
/// name-registry metadata digests.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a hash from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    #[must_use]
    pub fn to_plain_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// CIDv0 form of this digest: base58 of the sha2-256 multihash
    /// (`0x12`, `0x20`, digest).
    #[must_use]
    pub fn to_cid_v0(&self) -> String {
        let mut multihash = Vec::with_capacity(34);
        multihash.push(0x12);
        multihash.push(0x20);
        multihash.extend_from_slice(&self.0);
        bs58::encode(multihash).into_string()
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// SIGNED AMOUNT
// =============================================================================

/// Sign-magnitude 256-bit amount.
///
/// Zero is always stored as non-negative so equality is structural.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignedAmount {
    negative: bool,
    magnitude: U256,
}

impl SignedAmount {
    /// Zero.
    pub const ZERO: Self = Self {
        negative: false,
        magnitude: U256::zero(),
    };

    /// A non-negative amount.
    #[must_use]
    pub fn positive(magnitude: U256) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    /// A non-positive amount.
    #[must_use]
    pub fn negative(magnitude: U256) -> Self {
        Self {
            negative: !magnitude.is_zero(),
            magnitude,
        }
    }

    /// Returns true if the amount is strictly below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    /// Absolute value.
    #[must_use]
    pub fn magnitude(&self) -> U256 {
        self.magnitude
    }
}

impl From<U256> for SignedAmount {
    fn from(value: U256) -> Self {
        Self::positive(value)
    }
}

impl Neg for SignedAmount {
    type Output = Self;

    fn neg(self) -> Self {
        if self.negative {
            Self::positive(self.magnitude)
        } else {
            Self::negative(self.magnitude)
        }
    }
}

impl Add for SignedAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.negative == rhs.negative {
            let magnitude = self.magnitude.saturating_add(rhs.magnitude);
            return if self.negative {
                Self::negative(magnitude)
            } else {
                Self::positive(magnitude)
            };
        }
        // Opposite signs: the larger magnitude wins the sign.
        match self.magnitude.cmp(&rhs.magnitude) {
            Ordering::Less => {
                let magnitude = rhs.magnitude - self.magnitude;
                if rhs.negative {
                    Self::negative(magnitude)
                } else {
                    Self::positive(magnitude)
                }
            }
            Ordering::Equal => Self::ZERO,
            Ordering::Greater => {
                let magnitude = self.magnitude - rhs.magnitude;
                if self.negative {
                    Self::negative(magnitude)
                } else {
                    Self::positive(magnitude)
                }
            }
        }
    }
}

impl Sub for SignedAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl AddAssign for SignedAmount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for SignedAmount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl PartialOrd for SignedAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignedAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
        }
    }
}

impl fmt::Debug for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

impl FromStr for SignedAmount {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let magnitude = U256::from_dec_str(digits)
            .map_err(|e| ValueParseError::InvalidInteger(format!("{s}: {e:?}")))?;
        Ok(if negative {
            Self::negative(magnitude)
        } else {
            Self::positive(magnitude)
        })
    }
}

impl Serialize for SignedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SignedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
