use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length of a raw object id in bytes.
pub const OID_RAW_LEN: usize = 20;
/// Length of a hex-encoded object id.
pub const OID_HEX_LEN: usize = 40;
/// Shortest abbreviated id accepted by [`OidPrefix::parse`].
pub const MIN_PREFIX_LEN: usize = 4;

/// Content-addressed identifier for a stored object.
///
/// An `Oid` is the SHA-1 of an object's canonical serialization
/// (`"<kind> <len>\0<payload>"`). Identical content always produces the same
/// `Oid`; equality of ids is equality of objects. Ordering is plain byte
/// order, which is also the order used by pack indexes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; OID_RAW_LEN]);

impl Oid {
    /// Wrap a pre-computed 20-byte hash.
    pub const fn from_raw(raw: [u8; OID_RAW_LEN]) -> Self {
        Self(raw)
    }

    /// Build from a byte slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let raw: [u8; OID_RAW_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: OID_RAW_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    /// The all-zero id. Git uses it to mean "no object".
    pub const fn zero() -> Self {
        Self([0u8; OID_RAW_LEN])
    }

    /// Returns `true` if this is the all-zero id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; OID_RAW_LEN]
    }

    /// The raw 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; OID_RAW_LEN] {
        &self.0
    }

    /// Hex-encoded string representation (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 7 characters).
    pub fn short_hex(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(7);
        s
    }

    /// Parse a full 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != OID_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: OID_HEX_LEN,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short_hex())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; OID_RAW_LEN]> for Oid {
    fn from(raw: [u8; OID_RAW_LEN]) -> Self {
        Self(raw)
    }
}

impl From<Oid> for [u8; OID_RAW_LEN] {
    fn from(id: Oid) -> Self {
        id.0
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// OidPrefix
// ---------------------------------------------------------------------------

/// An abbreviated object id: the first `len` hex digits of some [`Oid`].
///
/// Odd lengths are supported; the trailing nibble is compared on its own.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OidPrefix {
    bytes: [u8; OID_RAW_LEN],
    len: usize,
}

impl OidPrefix {
    /// Parse an abbreviated id of 4 to 40 hex digits.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() < MIN_PREFIX_LEN {
            return Err(TypeError::PrefixTooShort {
                len: s.len(),
                min: MIN_PREFIX_LEN,
            });
        }
        if s.len() > OID_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: OID_HEX_LEN,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; OID_RAW_LEN];
        for (i, c) in s.chars().enumerate() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| TypeError::InvalidHex(s.to_string()))? as u8;
            if i % 2 == 0 {
                bytes[i / 2] = nibble << 4;
            } else {
                bytes[i / 2] |= nibble;
            }
        }
        Ok(Self {
            bytes,
            len: s.len(),
        })
    }

    /// Number of hex digits in the prefix.
    pub fn hex_len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the prefix spells out a complete id.
    pub fn is_full(&self) -> bool {
        self.len == OID_HEX_LEN
    }

    /// The complete id, if the prefix is full length.
    pub fn to_oid(&self) -> Option<Oid> {
        self.is_full().then(|| Oid(self.bytes))
    }

    /// First byte of the prefix; used to pick a fan-out bucket.
    pub fn first_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Lowest id that can match this prefix (remaining nibbles zero).
    pub fn min_oid(&self) -> Oid {
        Oid(self.bytes)
    }

    /// Returns `true` if `oid` starts with this prefix.
    pub fn matches(&self, oid: &Oid) -> bool {
        let full = self.len / 2;
        if oid.0[..full] != self.bytes[..full] {
            return false;
        }
        if self.len % 2 == 1 {
            return oid.0[full] & 0xf0 == self.bytes[full];
        }
        true
    }

    /// The prefix as lowercase hex.
    pub fn to_hex(&self) -> String {
        let mut s = hex::encode(self.bytes);
        s.truncate(self.len);
        s
    }
}

impl fmt::Debug for OidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OidPrefix({})", self.to_hex())
    }
}

impl fmt::Display for OidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
