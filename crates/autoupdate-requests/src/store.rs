//! Request file enumeration, locked reads, and confined deletion.
//!
//! # Design
//! - The requests directory is canonicalised once; every deletion target is re-resolved and
//!   must have that directory as its parent.
//! - Deletion removes the listed entry itself; a link inside the directory never takes its
//!   target with it.
//! - Reads hold the directory lock only for the duration of the read itself.
//! - Deletion never fails softly on an escaping path: that is the one fatal condition.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use autoupdate_config::LockSettings;
use serde_yaml::Value;
use tracing::{debug, error, warn};

use crate::error::{RequestError, RequestResult, StoreError, StoreResult};
use crate::lock::LockFile;

/// Name of the lock file kept inside the requests directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// A request file discovered by [`RequestStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFile {
    file_name: OsString,
    path: PathBuf,
}

impl RequestFile {
    /// File name used for ordering.
    #[must_use]
    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    /// Path inside the requests directory (not canonicalised).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display adapter for logs.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        self.file_name.to_string_lossy()
    }
}

/// Access to the requests directory.
#[derive(Debug, Clone)]
pub struct RequestStore {
    dir: PathBuf,
    lock: LockFile,
}

impl RequestStore {
    /// Open the requests directory, canonicalising it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RequestsDir`] when the path does not exist or is not a directory.
    pub fn open(dir: impl AsRef<Path>, lock: LockSettings) -> StoreResult<Self> {
        let requested = dir.as_ref();
        let dir = fs::canonicalize(requested).map_err(|source| StoreError::RequestsDir {
            path: requested.to_path_buf(),
            source,
        })?;
        if !dir.is_dir() {
            return Err(StoreError::RequestsDir {
                path: dir,
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        let lock = LockFile::new(dir.join(LOCK_FILE_NAME), lock);
        Ok(Self { dir, lock })
    }

    /// Canonical requests directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the directory lock.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    /// Regular files in the directory, lock file excluded, sorted by file name.
    ///
    /// Symbolic links are followed, so a link to a regular file is listed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] when the directory cannot be read.
    pub fn list(&self) -> StoreResult<Vec<RequestFile>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| self.list_error(source))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| self.list_error(source))?;
            let file_name = entry.file_name();
            if file_name == LOCK_FILE_NAME {
                continue;
            }
            let path = entry.path();
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => files.push(RequestFile { file_name, path }),
                Ok(_) => debug!(file = %path.display(), "skipping non-regular entry"),
                Err(err) => debug!(file = %path.display(), error = %err, "skipping unreadable entry"),
            }
        }
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    fn list_error(&self, source: io::Error) -> StoreError {
        StoreError::List {
            path: self.dir.clone(),
            source,
        }
    }

    /// Read and parse a request file under the directory lock.
    ///
    /// # Errors
    ///
    /// Returns a content-stage [`RequestError`] when the lock times out, or the file cannot be
    /// read or parsed.
    pub async fn read(&self, file: &RequestFile) -> RequestResult<Value> {
        let guard = self
            .lock
            .acquire()
            .await
            .map_err(|source| RequestError::ReadLock {
                path: file.path.clone(),
                source,
            })?;
        let contents = fs::read(&file.path);
        if let Err(err) = guard.release() {
            warn!(file = %file.name(), error = ?err, "failed to release requests lock");
        }
        let contents = contents.map_err(|source| RequestError::Read {
            path: file.path.clone(),
            source,
        })?;
        serde_yaml::from_slice(&contents).map_err(|source| RequestError::Parse {
            path: file.path.clone(),
            source,
        })
    }

    /// Delete a handled request file.
    ///
    /// Missing files, entries that are no longer regular files, and removal failures are
    /// logged and tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutsideRequestsDir`] when the file resolves outside the requests
    /// directory; the file is left in place.
    pub fn delete(&self, file: &RequestFile) -> StoreResult<()> {
        let target = match fs::canonicalize(&file.path) {
            Ok(target) => target,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(file = %file.name(), "request file vanished before deletion");
                return Ok(());
            }
            Err(err) => {
                error!(file = %file.name(), error = %err, "failed to resolve request file");
                return Ok(());
            }
        };

        if target.parent() != Some(self.dir.as_path()) {
            error!(
                file = %file.name(),
                target = %target.display(),
                requests_dir = %self.dir.display(),
                "refusing to delete file outside the requests directory"
            );
            return Err(StoreError::OutsideRequestsDir {
                path: target,
                requests_dir: self.dir.clone(),
            });
        }

        match fs::metadata(&target) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                error!(file = %file.name(), "request path is no longer a regular file");
                return Ok(());
            }
            Err(err) => {
                error!(file = %file.name(), error = %err, "failed to inspect request file");
                return Ok(());
            }
        }

        match fs::remove_file(&file.path) {
            Ok(()) => debug!(file = %file.name(), "request file deleted"),
            Err(err) => error!(file = %file.name(), error = %err, "failed to delete request file"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings() -> LockSettings {
        LockSettings {
            lifetime: Duration::from_secs(3),
            timeout: Duration::from_millis(300),
        }
    }

    fn names(files: &[RequestFile]) -> Vec<String> {
        files.iter().map(|file| file.name().to_string()).collect()
    }

    #[test]
    fn open_rejects_missing_and_non_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        assert!(matches!(
            RequestStore::open(&missing, settings()),
            Err(StoreError::RequestsDir { .. })
        ));
        let file = temp.path().join("file");
        fs::write(&file, b"x")?;
        assert!(matches!(
            RequestStore::open(&file, settings()),
            Err(StoreError::RequestsDir { .. })
        ));
        Ok(())
    }

    #[test]
    fn list_sorts_bytewise_and_skips_lock_and_dirs() -> Result<()> {
        let temp = TempDir::new()?;
        for name in ["b", "a", "B", "a2", LOCK_FILE_NAME] {
            fs::write(temp.path().join(name), b"user: x\n")?;
        }
        fs::create_dir(temp.path().join("nested"))?;
        let store = RequestStore::open(temp.path(), settings())?;
        assert_eq!(names(&store.list()?), vec!["B", "a", "a2", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn read_parses_and_releases_lock() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("r1"), b"user: alice\nrepo: users/x\n")?;
        let store = RequestStore::open(temp.path(), settings())?;
        let files = store.list()?;
        let value = store.read(&files[0]).await?;
        assert_eq!(value["user"].as_str(), Some("alice"));
        assert!(!store.lock_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn read_reports_parse_failure() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("r1"), b"user: [unclosed\n")?;
        let store = RequestStore::open(temp.path(), settings())?;
        let files = store.list()?;
        let err = store.read(&files[0]).await.err();
        assert!(matches!(err, Some(RequestError::Parse { .. })));
        assert!(!store.lock_path().exists());
        Ok(())
    }

    #[test]
    fn delete_removes_file_and_tolerates_missing() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("r1"), b"x")?;
        let store = RequestStore::open(temp.path(), settings())?;
        let files = store.list()?;
        store.delete(&files[0])?;
        assert!(!files[0].path().exists());
        store.delete(&files[0])?;
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn delete_removes_link_and_keeps_sibling_target() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("r2"), b"user: x\nrepo: users/x\n")?;
        std::os::unix::fs::symlink(temp.path().join("r2"), temp.path().join("r1"))?;
        let store = RequestStore::open(temp.path(), settings())?;
        let files = store.list()?;
        assert_eq!(names(&files), vec!["r1", "r2"]);

        store.delete(&files[0])?;
        assert!(fs::symlink_metadata(temp.path().join("r1")).is_err());
        assert!(temp.path().join("r2").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn delete_refuses_symlink_escaping_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let requests = temp.path().join("requests");
        fs::create_dir(&requests)?;
        let outside = temp.path().join("precious");
        fs::write(&outside, b"user: x\nrepo: users/x\n")?;
        std::os::unix::fs::symlink(&outside, requests.join("r1"))?;

        let store = RequestStore::open(&requests, settings())?;
        let files = store.list()?;
        assert_eq!(files.len(), 1);
        let err = store.delete(&files[0]).err();
        assert!(matches!(err, Some(StoreError::OutsideRequestsDir { .. })));
        assert!(outside.exists());
        assert!(requests.join("r1").exists());
        Ok(())
    }
}
