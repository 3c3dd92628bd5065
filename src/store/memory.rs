//! Read-only in-memory fixture collection

use std::collections::BTreeMap;

use bytes::Bytes;

use super::{FixtureStore, PutOutcome};
use crate::{Error, Result};

/// Read-only set of named blobs, for replaying fixtures embedded in tests or
/// loaded from somewhere other than a directory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Bytes>,
}

impl MemoryStore {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blob
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.insert(name.into(), data.into());
        self
    }

    /// Number of blobs held
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if no blobs are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<N, D> FromIterator<(N, D)> for MemoryStore
where
    N: Into<String>,
    D: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (N, D)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(name, data)| (name.into(), data.into()))
                .collect(),
        }
    }
}

impl FixtureStore for MemoryStore {
    fn location(&self) -> String {
        format!("memory store ({} files)", self.files.len())
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> Result<Bytes> {
        self.files.get(name).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no blob named '{name}'"),
            ))
        })
    }

    fn write(&self, name: &str, _data: &[u8]) -> Result<PutOutcome> {
        Err(Error::ReadOnlyStore(format!(
            "cannot write '{name}' to {}",
            self.location()
        )))
    }
}
