//! Maps a task repository to the active contests whose manifests reference it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use autoupdate_config::ActiveContests;
use serde::Deserialize;
use tracing::debug;

use crate::error::{RequestError, RequestResult};

/// Manifest file name inside a contest clone.
pub const MANIFEST_FILE: &str = "module.yaml";

/// The subset of a contest manifest the daemon reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ContestManifest {
    /// Tasks included in the contest.
    pub tasks: Vec<ManifestTask>,
}

/// One task entry of a contest manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestTask {
    /// Task repository path, e.g. `tasks/graphs/bfs`.
    pub path: String,
}

impl ContestManifest {
    /// Whether the manifest lists the given task.
    #[must_use]
    pub fn includes(&self, task: &str) -> bool {
        self.tasks.iter().any(|entry| entry.path == task)
    }
}

/// Reads contest manifests from the clone directory.
#[derive(Debug, Clone)]
pub struct TaskContestResolver {
    clone_dir: PathBuf,
    contests: Arc<ActiveContests>,
}

impl TaskContestResolver {
    /// Resolver over the clones stored in `clone_dir`.
    #[must_use]
    pub fn new(clone_dir: impl Into<PathBuf>, contests: Arc<ActiveContests>) -> Self {
        Self {
            clone_dir: clone_dir.into(),
            contests,
        }
    }

    /// Directory holding repository clones.
    #[must_use]
    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    /// Manifest location for a contest.
    #[must_use]
    pub fn manifest_path(&self, contest: &str) -> PathBuf {
        self.clone_dir.join(contest).join(MANIFEST_FILE)
    }

    /// Load and parse a contest manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ManifestRead`] or [`RequestError::ManifestParse`].
    pub fn load_manifest(&self, contest: &str) -> RequestResult<ContestManifest> {
        let path = self.manifest_path(contest);
        let contents = fs::read(&path).map_err(|source| RequestError::ManifestRead {
            contest: contest.to_string(),
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_slice(&contents).map_err(|source| RequestError::ManifestParse {
            contest: contest.to_string(),
            path,
            source,
        })
    }

    /// Active contests, in sorted order, whose manifests list `task`.
    ///
    /// # Errors
    ///
    /// Fails on the first manifest that cannot be read or parsed.
    pub fn contests_for_task(&self, task: &str) -> RequestResult<Vec<String>> {
        let mut matches = Vec::new();
        for contest in self.contests.iter() {
            if self.load_manifest(contest)?.includes(task) {
                matches.push(contest.to_string());
            }
        }
        debug!(task, contests = ?matches, "resolved task contests");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, contest: &str, body: &str) -> Result<()> {
        let dir = root.join(contest);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(MANIFEST_FILE), body)?;
        Ok(())
    }

    #[test]
    fn finds_contests_listing_task() -> Result<()> {
        let temp = TempDir::new()?;
        write_manifest(
            temp.path(),
            "contests/a",
            "tasks:\n  - path: tasks/t\n    points: 100\n",
        )?;
        write_manifest(temp.path(), "contests/b", "tasks:\n  - path: tasks/u\n")?;
        write_manifest(
            temp.path(),
            "contests/c",
            "title: C\ntasks:\n  - path: tasks/u\n  - path: tasks/t\n",
        )?;
        let resolver = TaskContestResolver::new(
            temp.path(),
            Arc::new(ActiveContests::new(["contests/c", "contests/a", "contests/b"])),
        );
        assert_eq!(
            resolver.contests_for_task("tasks/t")?,
            vec!["contests/a".to_string(), "contests/c".to_string()]
        );
        assert!(resolver.contests_for_task("tasks/none")?.is_empty());
        Ok(())
    }

    #[test]
    fn missing_or_malformed_manifest_fails() -> Result<()> {
        let temp = TempDir::new()?;
        let resolver = TaskContestResolver::new(
            temp.path(),
            Arc::new(ActiveContests::new(["contests/a"])),
        );
        assert!(matches!(
            resolver.contests_for_task("tasks/t"),
            Err(RequestError::ManifestRead { .. })
        ));

        write_manifest(temp.path(), "contests/a", "title: no tasks here\n")?;
        assert!(matches!(
            resolver.contests_for_task("tasks/t"),
            Err(RequestError::ManifestParse { .. })
        ));
        Ok(())
    }
}
