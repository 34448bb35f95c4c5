//! Maps validated requests to update service calls.
//!
//! # Design
//! - One exclusive scope per request, entered before the repository type is inspected and
//!   dropped on every exit path.
//! - The repository type is matched exhaustively; `Invalid` is an error, never a no-op.
//! - Contest fan-out follows the sorted order of the active contest set.

use std::sync::Arc;

use autoupdate_config::ActiveContests;
use tracing::{info, warn};

use crate::error::{RequestError, RequestResult};
use crate::request::{RepoType, Request};
use crate::resolver::TaskContestResolver;
use crate::service::{ContestUpdate, TaskGeneration, UpdateScope, UpdateService};

/// What a dispatched request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An active contest was updated.
    ContestUpdated {
        /// Contest repository.
        contest: String,
    },
    /// The contest is not active; nothing was called.
    ContestInactive {
        /// Contest repository.
        contest: String,
    },
    /// Users were refreshed and every active contest re-imported.
    UsersUpdated {
        /// Contests updated after the user refresh.
        contests: Vec<String>,
    },
    /// A task was generated and the contests using it updated.
    TaskGenerated {
        /// Task repository.
        task: String,
        /// Contests updated after generation.
        contests: Vec<String>,
    },
    /// No active contest uses the task; nothing was called.
    TaskUnused {
        /// Task repository.
        task: String,
    },
}

impl DispatchOutcome {
    /// Whether the request was accepted but required no update.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::ContestInactive { .. } | Self::TaskUnused { .. })
    }
}

/// Decides and performs the update calls a request implies.
#[derive(Debug)]
pub struct DispatchEngine<S> {
    service: S,
    contests: Arc<ActiveContests>,
    resolver: TaskContestResolver,
}

impl<S: UpdateService> DispatchEngine<S> {
    /// Engine driving `service` for the given contests.
    #[must_use]
    pub const fn new(
        service: S,
        contests: Arc<ActiveContests>,
        resolver: TaskContestResolver,
    ) -> Self {
        Self {
            service,
            contests,
            resolver,
        }
    }

    /// Underlying update service.
    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Active contests.
    #[must_use]
    pub fn contests(&self) -> &ActiveContests {
        &self.contests
    }

    /// Perform the update calls for one request inside a single exclusive scope.
    ///
    /// # Errors
    ///
    /// Returns a dispatch-stage error for invalid repository types or manifest failures, and
    /// an external-service error when entering the scope or any update call fails.
    pub async fn dispatch(&self, request: &Request) -> RequestResult<DispatchOutcome> {
        let mut scope = self
            .service
            .enter()
            .await
            .map_err(|source| RequestError::external("enter_scope", None, source))?;

        match request.repo_type() {
            RepoType::Contest => self.dispatch_contest(&mut scope, request.repo()).await,
            RepoType::User => self.dispatch_users(&mut scope).await,
            RepoType::Task => self.dispatch_task(&mut scope, request.repo()).await,
            RepoType::Invalid => Err(RequestError::UnrecognizedRepoType {
                repo: request.repo().to_string(),
            }),
        }
    }

    async fn dispatch_contest(
        &self,
        scope: &mut S::Scope,
        contest: &str,
    ) -> RequestResult<DispatchOutcome> {
        if !self.contests.contains(contest) {
            warn!(contest, "contest is not active; skipping");
            return Ok(DispatchOutcome::ContestInactive {
                contest: contest.to_string(),
            });
        }
        info!(contest, "updating contest");
        scope
            .update_contest(contest, ContestUpdate::FULL)
            .await
            .map_err(|source| RequestError::external("update_contest", Some(contest), source))?;
        Ok(DispatchOutcome::ContestUpdated {
            contest: contest.to_string(),
        })
    }

    async fn dispatch_users(&self, scope: &mut S::Scope) -> RequestResult<DispatchOutcome> {
        info!("updating users");
        scope
            .update_users()
            .await
            .map_err(|source| RequestError::external("update_users", None, source))?;
        let contests: Vec<String> = self.contests.iter().map(str::to_string).collect();
        update_contests(scope, &contests).await?;
        Ok(DispatchOutcome::UsersUpdated { contests })
    }

    async fn dispatch_task(
        &self,
        scope: &mut S::Scope,
        task: &str,
    ) -> RequestResult<DispatchOutcome> {
        let contests = self.resolver.contests_for_task(task)?;
        if contests.is_empty() {
            warn!(task, "task is not used by any active contest; skipping");
            return Ok(DispatchOutcome::TaskUnused {
                task: task.to_string(),
            });
        }
        info!(task, contests = ?contests, "generating task");
        scope
            .generate_task(task, TaskGeneration::UPDATE_OR_CLONE)
            .await
            .map_err(|source| RequestError::external("generate_task", Some(task), source))?;
        update_contests(scope, &contests).await?;
        Ok(DispatchOutcome::TaskGenerated {
            task: task.to_string(),
            contests,
        })
    }
}

async fn update_contests<C: UpdateScope>(scope: &mut C, contests: &[String]) -> RequestResult<()> {
    for contest in contests {
        info!(contest = %contest, "updating contest");
        scope
            .update_contest(contest, ContestUpdate::WITHOUT_USERS)
            .await
            .map_err(|source| RequestError::external("update_contest", Some(contest), source))?;
    }
    Ok(())
}
