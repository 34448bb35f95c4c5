//! Update service backed by an external updater program.
//!
//! # Design
//! - The exclusive scope is a lock file in the clone directory, shared with every other
//!   process that mutates the clones.
//! - Each call runs the updater to completion; a non-zero exit is a service failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use autoupdate_config::{LockSettings, UpdaterCommand};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{UpdateServiceError, UpdateServiceResult};
use crate::lock::{LockFile, LockGuard};
use crate::service::{ContestUpdate, TaskGeneration, UpdateScope, UpdateService};

/// Name of the lock file guarding the clone directory.
pub const UPDATE_LOCK_FILE: &str = ".lock";

/// Runs `<program> <args> <subcommand> ...` for each update.
#[derive(Debug, Clone)]
pub struct CommandUpdateService {
    command: UpdaterCommand,
    lock: LockFile,
}

impl CommandUpdateService {
    /// Service invoking `command`, serialised by a lock in `clone_dir`.
    #[must_use]
    pub fn new(command: UpdaterCommand, clone_dir: &Path, lock: LockSettings) -> Self {
        Self {
            command,
            lock: LockFile::new(clone_dir.join(UPDATE_LOCK_FILE), lock),
        }
    }

    /// Updater program and leading arguments.
    #[must_use]
    pub const fn command(&self) -> &UpdaterCommand {
        &self.command
    }

    /// Path of the update lock.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }
}

#[async_trait]
impl UpdateService for CommandUpdateService {
    type Scope = CommandScope;

    async fn enter(&self) -> UpdateServiceResult<CommandScope> {
        let guard = self
            .lock
            .acquire()
            .await
            .map_err(|source| UpdateServiceError::Scope { source })?;
        debug!(lock = %guard.path().display(), "entered update scope");
        Ok(CommandScope {
            program: self.command.program.clone(),
            args: self.command.args.clone(),
            _guard: guard,
        })
    }
}

/// Exclusive scope of [`CommandUpdateService`]; the update lock is held until drop.
#[derive(Debug)]
pub struct CommandScope {
    program: PathBuf,
    args: Vec<String>,
    _guard: LockGuard,
}

impl CommandScope {
    async fn run(&self, operation: &'static str, subcommand: &[String]) -> UpdateServiceResult<()> {
        info!(program = %self.program.display(), args = ?subcommand, "running updater");
        let status = Command::new(&self.program)
            .args(&self.args)
            .args(subcommand)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| UpdateServiceError::Spawn {
                operation,
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(UpdateServiceError::Exit {
                operation,
                code: status.code(),
            })
        }
    }
}

fn flagged(base: [&str; 2], flags: &[(bool, &str)]) -> Vec<String> {
    base.iter()
        .copied()
        .chain(
            flags
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| *flag),
        )
        .map(str::to_string)
        .collect()
}

fn contest_args(contest: &str, options: ContestUpdate) -> Vec<String> {
    flagged(
        ["update-contest", contest],
        &[
            (options.update, "--update"),
            (options.generate_new, "--generate-new"),
            (options.update_users, "--update-users"),
        ],
    )
}

fn task_args(task: &str, options: TaskGeneration) -> Vec<String> {
    flagged(
        ["generate-task", task],
        &[
            (options.update, "--update"),
            (options.allow_clone, "--allow-clone"),
        ],
    )
}

#[async_trait]
impl UpdateScope for CommandScope {
    async fn update_contest(
        &mut self,
        contest: &str,
        options: ContestUpdate,
    ) -> UpdateServiceResult<()> {
        self.run("update_contest", &contest_args(contest, options))
            .await
    }

    async fn generate_task(
        &mut self,
        task: &str,
        options: TaskGeneration,
    ) -> UpdateServiceResult<()> {
        self.run("generate_task", &task_args(task, options)).await
    }

    async fn update_users(&mut self) -> UpdateServiceResult<()> {
        self.run("update_users", &["update-users".to_string()])
            .await
    }
}
