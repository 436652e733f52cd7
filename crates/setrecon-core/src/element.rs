//! Opaque data elements.
//!
//! An [`Element`] wraps an arbitrary byte string and exposes it as a
//! canonical non-negative integer. Equality and ordering follow the integer
//! value, so leading zero bytes are not significant.

use num::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable element of a reconciled multiset.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Element(BigUint);

impl Element {
    /// Create from big-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Create from a machine integer.
    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Create from an existing big integer.
    pub fn from_biguint(value: BigUint) -> Self {
        Self(value)
    }

    /// The canonical integer representation.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Consume into the canonical integer.
    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    /// Minimal big-endian encoding. Zero encodes as a single zero byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Number of significant bits in the integer value.
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if hex.len() > 16 {
            write!(f, "Element({}..)", &hex[..16])
        } else {
            write!(f, "Element({})", hex)
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Element {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<BigUint> for Element {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Element {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_integer_value() {
        let a = Element::from_u64(2);
        let b = Element::from_bytes(&[0x01, 0x00]);
        assert!(a < b);
        assert_eq!(b.as_biguint(), &BigUint::from(256u32));
    }

    #[test]
    fn test_leading_zeros_not_significant() {
        assert_eq!(Element::from_bytes(&[0, 0, 7]), Element::from_u64(7));
        assert_eq!(Element::from_u64(7).to_bytes(), vec![7]);
    }

    #[test]
    fn test_debug_truncates() {
        let e = Element::from_bytes(&[0xAB; 20]);
        assert_eq!(format!("{:?}", e), "Element(abababababababab..)");
        assert_eq!(format!("{:?}", Element::from_u64(1)), "Element(01)");
    }
}
