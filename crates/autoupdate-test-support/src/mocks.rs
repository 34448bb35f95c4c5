//! Recording update service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use autoupdate_requests::{
    ContestUpdate, TaskGeneration, UpdateScope, UpdateService, UpdateServiceError,
    UpdateServiceResult,
};

/// One call observed by [`RecordingUpdateService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCall {
    /// Scope entered.
    Enter,
    /// `update_contest(contest, options)`.
    UpdateContest {
        /// Contest repository.
        contest: String,
        /// Options passed.
        options: ContestUpdate,
    },
    /// `generate_task(task, options)`.
    GenerateTask {
        /// Task repository.
        task: String,
        /// Options passed.
        options: TaskGeneration,
    },
    /// `update_users()`.
    UpdateUsers,
    /// Scope released.
    Exit,
}

impl UpdateCall {
    /// Contest update with the given options.
    #[must_use]
    pub fn contest(contest: &str, options: ContestUpdate) -> Self {
        Self::UpdateContest {
            contest: contest.to_string(),
            options,
        }
    }

    /// Task generation with the given options.
    #[must_use]
    pub fn task(task: &str, options: TaskGeneration) -> Self {
        Self::GenerateTask {
            task: task.to_string(),
            options,
        }
    }

    const fn is_scope_marker(&self) -> bool {
        matches!(self, Self::Enter | Self::Exit)
    }
}

#[derive(Debug, Default)]
struct State {
    journal: Vec<UpdateCall>,
    refuse_scope: bool,
    fail_users: bool,
    fail_task: Option<String>,
    fail_contest: Option<String>,
}

/// In-memory [`UpdateService`] that records every call, with optional failure injection.
#[derive(Debug, Clone, Default)]
pub struct RecordingUpdateService {
    state: Arc<Mutex<State>>,
}

impl RecordingUpdateService {
    /// Service that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `enter` fail.
    #[must_use]
    pub fn refusing_scope(self) -> Self {
        self.state().refuse_scope = true;
        self
    }

    /// Make `update_users` fail.
    #[must_use]
    pub fn failing_users(self) -> Self {
        self.state().fail_users = true;
        self
    }

    /// Make `generate_task` fail for `task`.
    #[must_use]
    pub fn failing_task(self, task: &str) -> Self {
        self.state().fail_task = Some(task.to_string());
        self
    }

    /// Make `update_contest` fail for `contest`.
    #[must_use]
    pub fn failing_contest(self, contest: &str) -> Self {
        self.state().fail_contest = Some(contest.to_string());
        self
    }

    /// Every recorded event, scope markers included.
    #[must_use]
    pub fn journal(&self) -> Vec<UpdateCall> {
        self.state().journal.clone()
    }

    /// Update calls only, scope markers stripped.
    #[must_use]
    pub fn calls(&self) -> Vec<UpdateCall> {
        self.state()
            .journal
            .iter()
            .filter(|call| !call.is_scope_marker())
            .cloned()
            .collect()
    }

    /// Number of scopes entered and released so far.
    #[must_use]
    pub fn scope_counts(&self) -> (usize, usize) {
        let state = self.state();
        let count = |marker: &UpdateCall| state.journal.iter().filter(|c| *c == marker).count();
        (count(&UpdateCall::Enter), count(&UpdateCall::Exit))
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.state().journal.clear();
    }

    fn record(&self, call: UpdateCall) {
        self.state().journal.push(call);
    }
}

fn injected(operation: &'static str) -> UpdateServiceError {
    UpdateServiceError::Operation {
        operation,
        detail: "injected failure".to_string(),
    }
}

#[async_trait]
impl UpdateService for RecordingUpdateService {
    type Scope = RecordingScope;

    async fn enter(&self) -> UpdateServiceResult<RecordingScope> {
        if self.state().refuse_scope {
            return Err(injected("enter"));
        }
        self.record(UpdateCall::Enter);
        Ok(RecordingScope {
            service: self.clone(),
        })
    }
}

/// Scope handed out by [`RecordingUpdateService`]; records `Exit` on drop.
#[derive(Debug)]
pub struct RecordingScope {
    service: RecordingUpdateService,
}

impl Drop for RecordingScope {
    fn drop(&mut self) {
        self.service.record(UpdateCall::Exit);
    }
}

#[async_trait]
impl UpdateScope for RecordingScope {
    async fn update_contest(
        &mut self,
        contest: &str,
        options: ContestUpdate,
    ) -> UpdateServiceResult<()> {
        self.service.record(UpdateCall::contest(contest, options));
        if self.service.state().fail_contest.as_deref() == Some(contest) {
            return Err(injected("update_contest"));
        }
        Ok(())
    }

    async fn generate_task(
        &mut self,
        task: &str,
        options: TaskGeneration,
    ) -> UpdateServiceResult<()> {
        self.service.record(UpdateCall::task(task, options));
        if self.service.state().fail_task.as_deref() == Some(task) {
            return Err(injected("generate_task"));
        }
        Ok(())
    }

    async fn update_users(&mut self) -> UpdateServiceResult<()> {
        self.service.record(UpdateCall::UpdateUsers);
        if self.service.state().fail_users {
            return Err(injected("update_users"));
        }
        Ok(())
    }
}
