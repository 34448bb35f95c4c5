//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers produced by the loader after validation.
//! - `ActiveContests` is immutable once built and iterates in sorted order.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory watched for request files.
    pub requests_dir: PathBuf,
    /// Directory under which repositories are cloned.
    pub clone_dir: PathBuf,
    /// Pause inserted between two requests of the same drain.
    pub request_cooling: Duration,
    /// Contests the daemon keeps current.
    pub active_contests: ActiveContests,
    /// Lock guarding reads from the requests directory.
    pub request_lock: LockSettings,
    /// Lock guarding repository mutation by the updater.
    pub update_lock: LockSettings,
    /// External updater invoked for each dispatch action.
    pub updater: UpdaterCommand,
    /// Optional log format override (`json` or `pretty`).
    pub log_format: Option<String>,
}

/// Lifetime and acquisition timeout of a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    /// Age after which a held lock is considered stale and may be broken.
    pub lifetime: Duration,
    /// Maximum time spent waiting to acquire the lock.
    pub timeout: Duration,
}

/// Program (plus leading arguments) that performs repository updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterCommand {
    /// Executable path.
    pub program: PathBuf,
    /// Arguments placed before the subcommand.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Immutable set of active contest identifiers (`contests/<name>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContests {
    contests: BTreeSet<String>,
}

impl ActiveContests {
    /// Build a set from contest identifiers.
    #[must_use]
    pub fn new<I, S>(contests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            contests: contests.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the given repository path names an active contest.
    #[must_use]
    pub fn contains(&self, repo: &str) -> bool {
        self.contests.contains(repo)
    }

    /// Iterate active contests in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.contests.iter().map(String::as_str)
    }

    /// Number of active contests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contests.len()
    }

    /// Whether no contest is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveContests {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
