//! Update service contract.
//!
//! # Design
//! - The service hands out an exclusive scope; every call for one request goes through it.
//! - Scopes release their exclusivity on drop, so early returns and errors cannot leak it.

use async_trait::async_trait;

use crate::error::UpdateServiceResult;

/// Options for a contest update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContestUpdate {
    /// Pull the latest contest repository.
    pub update: bool,
    /// Generate tasks that have no generated output yet.
    pub generate_new: bool,
    /// Refresh the contest's user list.
    pub update_users: bool,
}

impl ContestUpdate {
    /// Full refresh, used when the contest repository itself changed.
    pub const FULL: Self = Self {
        update: true,
        generate_new: true,
        update_users: true,
    };

    /// Refresh without re-importing users.
    pub const WITHOUT_USERS: Self = Self {
        update: true,
        generate_new: true,
        update_users: false,
    };
}

/// Options for task generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskGeneration {
    /// Pull the latest task repository.
    pub update: bool,
    /// Clone the repository when it is not present yet.
    pub allow_clone: bool,
}

impl TaskGeneration {
    /// Update, cloning if needed.
    pub const UPDATE_OR_CLONE: Self = Self {
        update: true,
        allow_clone: true,
    };
}

/// Entry point to the external update machinery.
#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Scope type handed out by [`UpdateService::enter`].
    type Scope: UpdateScope;

    /// Acquire the exclusive update scope.
    async fn enter(&self) -> UpdateServiceResult<Self::Scope>;
}

/// Operations available while the exclusive scope is held.
#[async_trait]
pub trait UpdateScope: Send {
    /// Update a contest repository.
    async fn update_contest(
        &mut self,
        contest: &str,
        options: ContestUpdate,
    ) -> UpdateServiceResult<()>;

    /// Generate a task repository.
    async fn generate_task(
        &mut self,
        task: &str,
        options: TaskGeneration,
    ) -> UpdateServiceResult<()>;

    /// Refresh the users repository.
    async fn update_users(&mut self) -> UpdateServiceResult<()>;
}
