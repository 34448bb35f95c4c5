//! Temporary daemon workspaces.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use autoupdate_config::LockSettings;
use autoupdate_requests::MANIFEST_FILE;
use tempfile::TempDir;

/// Lock settings short enough for tests: 3s lifetime, 200ms timeout.
#[must_use]
pub const fn quick_lock() -> LockSettings {
    LockSettings {
        lifetime: Duration::from_secs(3),
        timeout: Duration::from_millis(200),
    }
}

/// A temporary directory holding `requests/` and `clones/`.
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
    requests: PathBuf,
    clones: PathBuf,
}

impl Workspace {
    /// Create the directory layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directories cannot be created.
    pub fn new() -> Result<Self> {
        let root = TempDir::new()?;
        let requests = root.path().join("requests");
        let clones = root.path().join("clones");
        fs::create_dir(&requests)?;
        fs::create_dir(&clones)?;
        Ok(Self {
            root,
            requests,
            clones,
        })
    }

    /// Workspace root; outside both the requests and clone directories.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Requests directory.
    #[must_use]
    pub fn requests_dir(&self) -> &Path {
        &self.requests
    }

    /// Clone directory.
    #[must_use]
    pub fn clone_dir(&self) -> &Path {
        &self.clones
    }

    /// Write a well-formed request file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_request(&self, name: &str, user: &str, repo: &str) -> Result<PathBuf> {
        self.write_raw(name, &format!("user: {user}\nrepo: {repo}\n"))
    }

    /// Write a request file with arbitrary contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_raw(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.requests.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write `<clones>/<contest>/module.yaml` listing `tasks`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn write_manifest(&self, contest: &str, tasks: &[&str]) -> Result<PathBuf> {
        let dir = self.clones.join(contest);
        fs::create_dir_all(&dir)?;
        let mut body = String::from("tasks:\n");
        for task in tasks {
            body.push_str("  - path: ");
            body.push_str(task);
            body.push('\n');
        }
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, body)?;
        Ok(path)
    }

    /// Names of the files left in the requests directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn remaining_requests(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.requests)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_writes_requests_and_manifests() -> Result<()> {
        let workspace = Workspace::new()?;
        workspace.write_request("b", "alice", "tasks/t")?;
        workspace.write_raw("a", "garbage")?;
        let manifest = workspace.write_manifest("contests/x", &["tasks/t", "tasks/u"])?;

        assert_eq!(workspace.remaining_requests()?, vec!["a", "b"]);
        assert_eq!(
            fs::read_to_string(manifest)?,
            "tasks:\n  - path: tasks/t\n  - path: tasks/u\n"
        );
        Ok(())
    }
}
