//! Typed SHA-256 digest for content verification
//!
//! This module provides a SHA-256 hash type stored as a 32-byte array rather
//! than a hex string, which keeps queue items compact and makes digest
//! comparisons a plain byte compare. It also defines the expected-digest type
//! used by manifests, which carries a sentinel for unverified development
//! assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::queue::UNVERIFIED_DIGEST_SENTINEL;
use crate::errors::{ManifestError, ManifestResult};

/// SHA-256 digest stored as its raw 32-byte representation
///
/// Parses from and formats as a lowercase 64-character hex string, and
/// serializes transparently as hex for JSON compatibility with published
/// manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash([u8; 32]);

impl Sha256Hash {
    /// Create a SHA-256 hash from a hex string
    ///
    /// # Arguments
    ///
    /// * `hex` - 64-character hexadecimal string (case insensitive)
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidDigest` if the string is not a valid
    /// SHA-256 hex representation.
    pub fn from_hex(hex: &str) -> ManifestResult<Self> {
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ManifestError::InvalidDigest {
                digest: hex.to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hex_pair = std::str::from_utf8(chunk).unwrap(); // Safe: validated above
            bytes[i] = u8::from_str_radix(hex_pair, 16).unwrap(); // Safe: validated above
        }

        Ok(Sha256Hash(bytes))
    }

    /// Compute the SHA-256 digest of a byte slice
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Sha256Hash(out)
    }

    /// Convert the hash to a lowercase 64-character hex string
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(64), |mut acc, b| {
            write!(&mut acc, "{:02x}", b).unwrap();
            acc
        })
    }

    /// Get the raw byte array representation
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Sha256Hash {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Transparent serialization - serialize as hex string for JSON compatibility
impl Serialize for Sha256Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Published digest of a downloadable asset
///
/// Manifests may ship the `"dev"` sentinel (or an empty string) instead of a
/// real digest while content is still in flux; such assets skip verification
/// entirely. Serializes back to the sentinel so persisted queue state
/// round-trips development manifests unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedDigest {
    /// Verify fetched bytes against this SHA-256 value
    Sha256(Sha256Hash),
    /// Skip verification (development manifests only)
    Unverified,
}

impl ExpectedDigest {
    /// Parse a manifest digest string
    ///
    /// The sentinel and the empty string mean "unverified"; anything else
    /// must be a valid SHA-256 hex string.
    pub fn parse(value: &str) -> ManifestResult<Self> {
        if value.is_empty() || value == UNVERIFIED_DIGEST_SENTINEL {
            return Ok(ExpectedDigest::Unverified);
        }
        Ok(ExpectedDigest::Sha256(Sha256Hash::from_hex(value)?))
    }

    /// Check whether verification is enabled for this digest
    pub fn is_verified(&self) -> bool {
        matches!(self, ExpectedDigest::Sha256(_))
    }

    /// Check fetched bytes against the expected value
    ///
    /// Returns the computed digest on success so callers can log it.
    /// `Unverified` accepts any bytes.
    pub fn matches(&self, bytes: &[u8]) -> Result<Sha256Hash, Sha256Hash> {
        let actual = Sha256Hash::of(bytes);
        match self {
            ExpectedDigest::Unverified => Ok(actual),
            ExpectedDigest::Sha256(expected) if *expected == actual => Ok(actual),
            ExpectedDigest::Sha256(_) => Err(actual),
        }
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedDigest::Sha256(hash) => write!(f, "{}", hash),
            ExpectedDigest::Unverified => write!(f, "{}", UNVERIFIED_DIGEST_SENTINEL),
        }
    }
}

impl Serialize for ExpectedDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ExpectedDigest::Sha256(hash) => hash.serialize(serializer),
            ExpectedDigest::Unverified => serializer.serialize_str(UNVERIFIED_DIGEST_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for ExpectedDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
