//! Fixture storage
//!
//! A fixture is a request snapshot and a response snapshot stored under one
//! fingerprint. Each snapshot lives in its own file named
//!
//! ```text
//! [<label> - ]<fingerprint>.<kind>.txt
//! ```
//!
//! where `<kind>` is `req` or `res`. The label is free text for people
//! browsing the fixture directory and is ignored by lookups.
//!
//! When several files carry the same fingerprint and kind (for example the
//! same fixture copied under two labels), lookups return the
//! lexicographically first name and log a warning. Use
//! [`FixtureStore::matches`] to see every candidate.

mod dir;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fingerprint::Fingerprint;
use crate::{Error, Result};

pub use dir::DirStore;
pub use memory::MemoryStore;

/// Separator between the optional label and the fingerprint
pub const LABEL_SEPARATOR: &str = " - ";

/// Which half of a fixture a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureKind {
    /// Request snapshot, informational only
    Request,
    /// Response snapshot, read back during replay
    Response,
}

impl FixtureKind {
    /// Short tag used in file names
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Request => "req",
            Self::Response => "res",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Request => ".req.txt",
            Self::Response => ".res.txt",
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parsed fixture file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureName {
    /// Optional human label
    pub label: Option<String>,
    /// Request fingerprint
    pub fingerprint: Fingerprint,
    /// Snapshot kind
    pub kind: FixtureKind,
}

impl FixtureName {
    /// Build a name, sanitizing the label so it stays a single file name
    #[must_use]
    pub fn new(fingerprint: Fingerprint, kind: FixtureKind, label: Option<&str>) -> Self {
        Self {
            label: label.and_then(sanitize_label),
            fingerprint,
            kind,
        }
    }

    /// Parse a file name, returning `None` for anything that is not a fixture
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (stem, kind) = [FixtureKind::Request, FixtureKind::Response]
            .into_iter()
            .find_map(|kind| name.strip_suffix(kind.suffix()).map(|stem| (stem, kind)))?;

        let (label, fingerprint) = match stem.rsplit_once(LABEL_SEPARATOR) {
            Some((label, fingerprint)) => (Some(label), fingerprint),
            None => (None, stem),
        };
        let fingerprint = Fingerprint::parse(fingerprint).ok()?;

        Some(Self {
            label: label.filter(|l| !l.is_empty()).map(str::to_string),
            fingerprint,
            kind,
        })
    }
}

impl fmt::Display for FixtureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{label}{LABEL_SEPARATOR}")?;
        }
        write!(f, "{}{}", self.fingerprint, self.kind.suffix())
    }
}

fn sanitize_label(label: &str) -> Option<String> {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Result of writing a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// No file existed under the name
    Created,
    /// A file with identical content already existed
    Unchanged,
    /// A file with different content was overwritten
    Replaced,
}

/// Every snapshot stored under one fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureEntry {
    /// Shared fingerprint
    pub fingerprint: Fingerprint,
    /// Request snapshot file names, sorted
    pub requests: Vec<String>,
    /// Response snapshot file names, sorted
    pub responses: Vec<String>,
}

impl FixtureEntry {
    /// A request was recorded but no response was stored
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.responses.is_empty()
    }

    /// More than one response snapshot shares the fingerprint
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.responses.len() > 1
    }
}

/// A named-blob collection holding fixtures
///
/// Implementors only provide raw access. Lookup by fingerprint, the name
/// scheme and the tie-break rule live in the provided methods.
pub trait FixtureStore: Send + Sync + fmt::Debug {
    /// Human readable location for error messages
    fn location(&self) -> String;

    /// All blob names in the collection
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be listed
    fn names(&self) -> Result<Vec<String>>;

    /// Read a blob by exact name
    ///
    /// # Errors
    ///
    /// Returns error if the blob cannot be read
    fn read(&self, name: &str) -> Result<Bytes>;

    /// Write a blob by exact name
    ///
    /// # Errors
    ///
    /// Returns error if the store is read-only or the write fails
    fn write(&self, name: &str, data: &[u8]) -> Result<PutOutcome>;

    /// Store one snapshot as `[<label> - ]<fingerprint>.<kind>.txt`
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn put(
        &self,
        fingerprint: &Fingerprint,
        kind: FixtureKind,
        label: Option<&str>,
        data: &[u8],
    ) -> Result<PutOutcome> {
        let name = FixtureName::new(fingerprint.clone(), kind, label);
        self.write(&name.to_string(), data)
    }

    /// Names of every snapshot matching the fingerprint and kind, sorted
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be listed
    fn matches(&self, fingerprint: &Fingerprint, kind: FixtureKind) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .names()?
            .into_iter()
            .filter(|name| {
                FixtureName::parse(name)
                    .is_some_and(|parsed| parsed.kind == kind && &parsed.fingerprint == fingerprint)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Read the snapshot for a fingerprint
    ///
    /// # Errors
    ///
    /// Returns [`Error::FixtureNotFound`] if nothing matches, or the read error
    fn get(&self, fingerprint: &Fingerprint, kind: FixtureKind) -> Result<Bytes> {
        let names = self.matches(fingerprint, kind)?;

        let Some(first) = names.first() else {
            return Err(Error::FixtureNotFound {
                fingerprint: fingerprint.to_string(),
                kind,
                location: self.location(),
            });
        };

        if names.len() > 1 {
            warn!(
                "{} {} snapshots share fingerprint {} in {}, using '{}'",
                names.len(),
                kind,
                fingerprint,
                self.location(),
                first
            );
        }

        self.read(first)
    }

    /// Group every fixture file by fingerprint
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be listed
    fn list(&self) -> Result<Vec<FixtureEntry>> {
        let mut entries: BTreeMap<Fingerprint, FixtureEntry> = BTreeMap::new();

        for name in self.names()? {
            let Some(parsed) = FixtureName::parse(&name) else {
                continue;
            };
            let entry = entries
                .entry(parsed.fingerprint.clone())
                .or_insert_with(|| FixtureEntry {
                    fingerprint: parsed.fingerprint,
                    requests: Vec::new(),
                    responses: Vec::new(),
                });
            match parsed.kind {
                FixtureKind::Request => entry.requests.push(name),
                FixtureKind::Response => entry.responses.push(name),
            }
        }

        Ok(entries
            .into_values()
            .map(|mut entry| {
                entry.requests.sort();
                entry.responses.sort();
                entry
            })
            .collect())
    }
}
