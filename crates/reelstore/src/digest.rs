//! KeyDigest: a BLAKE3 digest of a logical key, truncated to 128 bits (32 hex chars).
//!
//! Logical keys are caller-chosen strings ("order", "textmate_lang_rust", ...)
//! and may contain characters that are not filesystem-safe. The digest gives
//! every key a fixed-width, shardable file name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A key digest - 128 bits (16 bytes, 32 hex chars) of BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyDigest(String);

/// Errors that can occur when parsing a digest.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("invalid digest length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in digest")]
    InvalidHex,
}

impl KeyDigest {
    /// Digest a logical key.
    pub fn of(key: &str) -> Self {
        let hash = blake3::hash(key.as_bytes());
        Self(hex::encode(&hash.as_bytes()[..16]))
    }

    /// Create from an existing digest string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, DigestError> {
        if s.len() != 32 {
            return Err(DigestError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }

    /// First 2 characters, used for directory sharding.
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }

    /// Remainder after the prefix, used as the file stem.
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeyDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}
