//! Request fingerprinting for content-addressed fixture names
//!
//! A fingerprint is a prefix of the lower-case hex SHA-256 digest of a
//! request's canonical wire bytes (see [`crate::wire::encode_request`]).
//! It is a content hash: any byte difference in method, target, header order,
//! header values or body gives a different digest.
//!
//! The prefix length trades readability for collision risk. With `n` hex
//! characters the space is `16^n`, so the birthday bound for a first
//! collision is around `2^(2n)` fixtures in one store: roughly 65 thousand at
//! the default of 8 characters, but only about a thousand at 5.

use std::fmt;

use bytes::Bytes;
use http::Request;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::wire::encode_request;
use crate::{Error, Result};

/// Default fingerprint length in hex characters
pub const DEFAULT_LENGTH: usize = 8;

/// Shortest accepted fingerprint
pub const MIN_LENGTH: usize = 4;

/// Longest accepted fingerprint (a full SHA-256 digest)
pub const MAX_LENGTH: usize = 64;

/// Short, lower-case key identifying a canonical request
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse and case-normalize a fingerprint string
    ///
    /// # Errors
    ///
    /// Returns error if the string is empty, too long, or contains anything
    /// other than ASCII letters and digits
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() || value.len() > MAX_LENGTH {
            return Err(Error::InvalidFingerprint(format!(
                "'{value}' must be 1..={MAX_LENGTH} characters"
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidFingerprint(format!(
                "'{value}' must be ASCII alphanumeric"
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The fingerprint as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Fingerprint settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Number of hex characters kept from the digest
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    DEFAULT_LENGTH
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }
}

/// Compute the fingerprint of canonical request bytes
///
/// # Panics
///
/// Panics if `length` is outside `MIN_LENGTH..=MAX_LENGTH` (programming error;
/// configured lengths are checked by [`crate::config::Config::validate`])
#[must_use]
pub fn fingerprint_bytes(canonical: &[u8], length: usize) -> Fingerprint {
    assert!(
        (MIN_LENGTH..=MAX_LENGTH).contains(&length),
        "fingerprint length must be in {MIN_LENGTH}..={MAX_LENGTH}, got {length}"
    );

    let digest = Sha256::digest(canonical);
    let mut encoded = hex::encode(digest);
    encoded.truncate(length);
    Fingerprint(encoded)
}

/// Compute the fingerprint of a request
#[must_use]
pub fn fingerprint_request(request: &Request<Bytes>, length: usize) -> Fingerprint {
    fingerprint_bytes(&encode_request(request), length)
}
