//! Directory-backed fixture store

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::debug;

use super::{FixtureStore, PutOutcome};
use crate::Result;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fixture store over a filesystem directory
///
/// The directory is created on first write. A missing directory lists as
/// empty, so replaying against a fresh path reports "not found" rather than an
/// I/O error. Writes go through a temporary file and a rename, so a reader
/// never sees a half-written snapshot.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the fixtures
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid fixture file name '{name}'"),
            )
            .into());
        }
        Ok(self.root.join(name))
    }
}

impl FixtureStore for DirStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Bytes> {
        let path = self.path_of(name)?;
        Ok(Bytes::from(fs::read(path)?))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<PutOutcome> {
        let path = self.path_of(name)?;

        let outcome = match fs::read(&path) {
            Ok(existing) if existing == data => return Ok(PutOutcome::Unchanged),
            Ok(_) => PutOutcome::Replaced,
            Err(e) if e.kind() == io::ErrorKind::NotFound => PutOutcome::Created,
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&self.root)?;

        let temp = self.root.join(format!(
            ".{name}.{}-{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = fs::write(&temp, data).and_then(|()| fs::rename(&temp, &path)) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!("Wrote {} ({} bytes, {:?})", path.display(), data.len(), outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::store::FixtureKind;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_lists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirStore::new(temp_dir.path().join("does-not-exist"));

        assert!(store.names().unwrap().is_empty());
        let err = store
            .get(&Fingerprint::parse("ab12c").unwrap(), FixtureKind::Response)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("fixtures");
        let store = DirStore::new(&root);

        let outcome = store.write("ab12c.res.txt", b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
        assert_eq!(outcome, PutOutcome::Created);
        assert!(root.join("ab12c.res.txt").exists());
    }

    #[test]
    fn test_write_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirStore::new(temp_dir.path());

        assert_eq!(store.write("ab12c.req.txt", b"one").unwrap(), PutOutcome::Created);
        assert_eq!(store.write("ab12c.req.txt", b"one").unwrap(), PutOutcome::Unchanged);
        assert_eq!(store.write("ab12c.req.txt", b"two").unwrap(), PutOutcome::Replaced);
        assert_eq!(store.read("ab12c.req.txt").unwrap().as_ref(), b"two");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirStore::new(temp_dir.path());

        store.write("ab12c.res.txt", b"data").unwrap();
        assert_eq!(store.names().unwrap(), vec!["ab12c.res.txt".to_string()]);
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirStore::new(temp_dir.path());

        assert!(store.write("../escape.res.txt", b"x").is_err());
        assert!(store.read("sub/ab12c.res.txt").is_err());
    }

    #[test]
    fn test_put_and_get_labeled() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirStore::new(temp_dir.path());
        let fingerprint = Fingerprint::parse("ab12c").unwrap();

        store
            .put(&fingerprint, FixtureKind::Response, Some("example.com"), b"stored")
            .unwrap();

        assert!(temp_dir.path().join("example.com - ab12c.res.txt").exists());
        let data = store.get(&fingerprint, FixtureKind::Response).unwrap();
        assert_eq!(data.as_ref(), b"stored");
    }
}
