//! Object identifiers.

use crate::{Result, TypesError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a SHA-1 object id in bytes.
pub const RAW_LEN: usize = 20;

/// Length of the hex text form of an object id.
pub const HEX_LEN: usize = 40;

/// A 20-byte SHA-1 object identifier.
///
/// The protocol only ever carries the text form, which must be exactly 40
/// lowercase hex characters. Uppercase hex is rejected even though it
/// would decode, since no conforming peer emits it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; RAW_LEN]);

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ObjectId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl ObjectId {
    /// The all-zero id, used by Git for "no object".
    pub const ZERO: Self = Self([0u8; RAW_LEN]);

    /// Creates an `ObjectId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; RAW_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses an `ObjectId` from its hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        Self::from_hex_bytes(hex.as_bytes())
    }

    /// Parses an `ObjectId` from hex text held in a byte slice.
    pub fn from_hex_bytes(hex: &[u8]) -> Result<Self> {
        if hex.len() != HEX_LEN {
            return Err(TypesError::InvalidLength(hex.len()));
        }
        if let Some(offset) = hex.iter().position(|b| !is_lower_hex(*b)) {
            return Err(TypesError::InvalidCharacter {
                byte: char::from(hex[offset]),
                offset,
            });
        }

        let mut bytes = [0u8; RAW_LEN];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|_| TypesError::InvalidLength(hex.len()))?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0
    }

    /// Returns the hex representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns true for the all-zero id.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; RAW_LEN]
    }
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

impl FromStr for ObjectId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; RAW_LEN]> for ObjectId {
    fn from(value: [u8; RAW_LEN]) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
