//! Error types for reqtape

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::recorder::Mode;
use crate::store::FixtureKind;

/// Result type for reqtape operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while recording or replaying fixtures
#[derive(Debug, Error)]
pub enum Error {
    /// Store I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No stored snapshot matches the fingerprint
    #[error("Fixture not found: no {kind} snapshot for {fingerprint} in {location}")]
    FixtureNotFound {
        /// Fingerprint that was looked up
        fingerprint: String,
        /// Snapshot kind that was looked up
        kind: FixtureKind,
        /// Human readable store location
        location: String,
    },

    /// A stored blob is not a valid HTTP message
    #[error("Malformed fixture: {0}")]
    MalformedFixture(String),

    /// The delegate transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The delegate transport did not answer in time
    #[error("Transport timed out after {0:?}")]
    Timeout(Duration),

    /// Context wrapper identifying the mode and request that failed
    #[error("problem while {verb} transport ({fingerprint}): {source}", verb = .mode.verb())]
    Recorder {
        /// Mode that produced the error
        mode: Mode,
        /// Fingerprint of the failing request
        fingerprint: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Write attempted against a read-only store
    #[error("Store is read-only: {0}")]
    ReadOnlyStore(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request/response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Fingerprint string with a bad length or alphabet
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

impl Error {
    /// Innermost error, looking through [`Error::Recorder`] wrappers
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::Recorder { source, .. } => source.root(),
            other => other,
        }
    }

    /// True if no fixture was recorded for the request
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::FixtureNotFound { .. })
    }

    /// True if a fixture exists but could not be parsed
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self.root(), Self::MalformedFixture(_))
    }

    pub(crate) fn in_mode(self, mode: Mode, fingerprint: &str) -> Self {
        Self::Recorder {
            mode,
            fingerprint: fingerprint.to_string(),
            source: Box::new(self),
        }
    }
}
