//! Commit content hashes.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// Width of a hash in its binary form.
pub const HASH_LEN: usize = 20;

/// Hex characters shown by [`Hash::to_short_string`].
const SHORT_LEN: usize = 7;

/// A fixed-width commit hash.
///
/// Stored as raw bytes; displayed and parsed as lowercase hex.
///
/// ```rust
/// use commitmap_core::Hash;
///
/// let hash: Hash = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
/// assert_eq!(hash.to_short_string(), "0123456");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a hash from a slice, which must be exactly [`HASH_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHash`] on a length mismatch.
    pub fn from_slice(bytes: &[u8]) -> CoreResult<Self> {
        let arr: [u8; HASH_LEN] = bytes.try_into().map_err(|_| {
            CoreError::invalid_hash(format!(
                "expected {HASH_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parses a 40 character hex string. Upper and lower case are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHash`] on bad length or a non-hex digit.
    pub fn from_hex(s: &str) -> CoreResult<Self> {
        let digits = s.as_bytes();
        if digits.len() != HASH_LEN * 2 {
            return Err(CoreError::invalid_hash(format!(
                "expected {} hex digits, got {}",
                HASH_LEN * 2,
                digits.len()
            )));
        }

        let mut bytes = [0u8; HASH_LEN];
        for (i, pair) in digits.chunks_exact(2).enumerate() {
            bytes[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        }
        Ok(Self(bytes))
    }

    /// The binary form.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Full lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Abbreviated hex form, as shown in log views.
    #[must_use]
    pub fn to_short_string(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }
}

fn hex_value(digit: u8) -> CoreResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(CoreError::invalid_hash(format!(
            "invalid hex digit {:?}",
            char::from(other)
        ))),
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}
