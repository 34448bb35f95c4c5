//! Lifetime-bounded lock files.
//!
//! # Design
//! - A lock is a file created with `O_EXCL`; its content records the owner token and expiry.
//! - A lock whose expiry has passed is stale and may be broken by the next acquirer, so a
//!   crashed holder never wedges the directory.
//! - Release only removes the file while it still carries the holder's token.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use autoupdate_config::LockSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LockError, LockResult};

/// Default delay between acquisition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    token: Uuid,
    pid: u32,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl LockRecord {
    fn new(lifetime: Duration) -> Self {
        let acquired_at = Utc::now();
        let lifetime =
            chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::weeks(52));
        Self {
            token: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at,
            expires_at: acquired_at
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// A lock file with a bounded lifetime and acquisition timeout.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    settings: LockSettings,
    poll_interval: Duration,
}

impl LockFile {
    /// Describe a lock stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, settings: LockSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the delay between acquisition attempts.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured lifetime and timeout.
    #[must_use]
    pub const fn settings(&self) -> LockSettings {
        self.settings
    }

    /// Wait until the lock is taken or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when the lock stays held for the whole timeout, or an
    /// IO error when the lock file cannot be created or inspected.
    pub async fn acquire(&self) -> LockResult<LockGuard> {
        let deadline = Instant::now() + self.settings.timeout;
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    path: self.path.clone(),
                    timeout: self.settings.timeout,
                });
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Take the lock if it is free or stale; `None` when someone else holds it.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock file cannot be created, written, or inspected.
    pub fn try_acquire(&self) -> LockResult<Option<LockGuard>> {
        let record = LockRecord::new(self.settings.lifetime);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if self.break_if_stale()? {
                    return self.try_acquire();
                }
                return Ok(None);
            }
            Err(source) => return Err(LockError::io("lock.create", &self.path, source)),
        };

        let encoded = serde_json::to_vec(&record).map_err(|source| LockError::Record {
            path: self.path.clone(),
            source,
        })?;
        if let Err(source) = file.write_all(&encoded) {
            remove_partial(&self.path);
            return Err(LockError::io("lock.write", &self.path, source));
        }
        debug!(path = %self.path.display(), token = %record.token, "lock acquired");
        Ok(Some(LockGuard {
            path: self.path.clone(),
            token: record.token,
            released: false,
        }))
    }

    fn break_if_stale(&self) -> LockResult<bool> {
        let expired = match fs::read(&self.path) {
            Ok(contents) => match serde_json::from_slice::<LockRecord>(&contents) {
                Ok(record) => record.expires_at <= Utc::now(),
                // The holder may not have written its record yet; judge by age instead.
                Err(_) => self.older_than_lifetime()?,
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(LockError::io("lock.inspect", &self.path, source)),
        };
        if !expired {
            return Ok(false);
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                warn!(path = %self.path.display(), "broke stale lock");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LockError::io("lock.break", &self.path, source)),
        }
    }

    fn older_than_lifetime(&self) -> LockResult<bool> {
        let modified = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(LockError::io("lock.inspect", &self.path, source)),
        };
        Ok(modified
            .elapsed()
            .is_ok_and(|age| age >= self.settings.lifetime))
    }
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    token: Uuid,
    released: bool,
}

impl LockGuard {
    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now and report failures instead of logging them.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock file cannot be inspected or removed.
    pub fn release(mut self) -> LockResult<()> {
        self.released = true;
        remove_owned(&self.path, self.token)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = remove_owned(&self.path, self.token) {
            warn!(path = %self.path.display(), error = ?err, "failed to release lock");
        }
    }
}

fn remove_owned(path: &Path, token: Uuid) -> LockResult<()> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "lock vanished before release");
            return Ok(());
        }
        Err(source) => return Err(LockError::io("lock.release_inspect", path, source)),
    };
    let owned = serde_json::from_slice::<LockRecord>(&contents)
        .is_ok_and(|record| record.token == token);
    if !owned {
        warn!(path = %path.display(), "lock was broken by another holder; leaving it");
        return Ok(());
    }
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "lock released");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::io("lock.release", path, source)),
    }
}

/// Drop a lock file whose record could not be written; failures are only logged.
fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove half-written lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn settings(lifetime_secs: u64, timeout_millis: u64) -> LockSettings {
        LockSettings {
            lifetime: Duration::from_secs(lifetime_secs),
            timeout: Duration::from_millis(timeout_millis),
        }
    }

    #[tokio::test]
    async fn acquire_and_release_removes_lock_file() -> Result<()> {
        let temp = TempDir::new()?;
        let lock = LockFile::new(temp.path().join(".lock"), settings(3, 500));

        let guard = lock.acquire().await?;
        assert!(lock.path().exists());
        guard.release()?;
        assert!(!lock.path().exists());

        {
            let _guard = lock.acquire().await?;
            assert!(lock.path().exists());
        }
        assert!(!lock.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn held_lock_times_out_second_acquirer() -> Result<()> {
        let temp = TempDir::new()?;
        let lock = LockFile::new(temp.path().join(".lock"), settings(60, 200))
            .with_poll_interval(Duration::from_millis(20));

        let _held = lock.acquire().await?;
        let err = lock
            .acquire()
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected timeout"))?;
        assert!(matches!(err, LockError::Timeout { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn expired_record_is_broken() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(".lock");
        let stale = LockRecord {
            token: Uuid::new_v4(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::seconds(120),
            expires_at: Utc::now() - chrono::Duration::seconds(60),
        };
        fs::write(&path, serde_json::to_vec(&stale)?)?;

        let lock =
            LockFile::new(&path, settings(3, 500)).with_poll_interval(Duration::from_millis(10));
        let guard = lock.acquire().await?;
        let record: LockRecord = serde_json::from_slice(&fs::read(&path)?)?;
        assert_ne!(record.token, stale.token);
        guard.release()?;
        Ok(())
    }

    #[test]
    fn fresh_unreadable_record_is_not_broken() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(".lock");
        fs::write(&path, b"")?;
        let lock = LockFile::new(&path, settings(60, 10));
        assert!(lock.try_acquire()?.is_none());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn release_leaves_foreign_lock_in_place() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(".lock");
        let lock = LockFile::new(&path, settings(3, 10));
        let guard = lock
            .try_acquire()?
            .ok_or_else(|| anyhow::anyhow!("expected free lock"))?;

        let foreign = LockRecord::new(Duration::from_secs(3));
        fs::write(&path, serde_json::to_vec(&foreign)?)?;
        guard.release()?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn half_written_lock_cleanup_tolerates_missing_file() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(".lock");
        fs::write(&path, b"{")?;
        remove_partial(&path);
        assert!(!path.exists());
        remove_partial(&path);
        assert!(LockFile::new(&path, settings(3, 10)).try_acquire()?.is_some());
        Ok(())
    }
}
