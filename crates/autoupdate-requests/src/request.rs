//! Request descriptors and their structural validation.
//!
//! # Design
//! - The repository type is parsed once into a closed enum; unknown prefixes become
//!   [`RepoType::Invalid`] instead of an error at parse time.
//! - Validation runs the checks in a fixed order and stops at the first failure.

use serde_yaml::Value;

use crate::error::{RequestError, RequestResult};

/// Classification of the repository a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    /// `tasks/...`
    Task,
    /// `contests/...`
    Contest,
    /// `users/...`
    User,
    /// Any other first path segment.
    Invalid,
}

impl RepoType {
    /// Classify a repository path by its first `/`-delimited segment.
    #[must_use]
    pub fn of(repo: &str) -> Self {
        match repo.split('/').next() {
            Some("tasks") => Self::Task,
            Some("contests") => Self::Contest,
            Some("users") => Self::User,
            _ => Self::Invalid,
        }
    }

    /// Directory prefix for the type, `None` for [`RepoType::Invalid`].
    #[must_use]
    pub const fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Task => Some("tasks"),
            Self::Contest => Some("contests"),
            Self::User => Some("users"),
            Self::Invalid => None,
        }
    }
}

/// A parsed repository-update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    user: String,
    repo: String,
    repo_type: RepoType,
}

impl Request {
    /// Build a request without validation; the type is derived from `repo`.
    #[must_use]
    pub fn new(user: impl Into<String>, repo: impl Into<String>) -> Self {
        let repo = repo.into();
        let repo_type = RepoType::of(&repo);
        Self {
            user: user.into(),
            repo,
            repo_type,
        }
    }

    /// Validate a parsed document and build the request it describes.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] naming the first failed check: the document is
    /// not a mapping, `user` or `repo` is missing or not a string, or the repository type is
    /// not one of `tasks`, `contests`, `users`.
    pub fn from_document(document: &Value) -> RequestResult<Self> {
        let mapping = document.as_mapping().ok_or_else(|| {
            RequestError::validation("request", "not_a_mapping", Some(kind_of(document).into()))
        })?;

        let user = required_string(mapping.get("user"), "user")?;
        let repo = required_string(mapping.get("repo"), "repo")?;

        let request = Self::new(user, repo);
        if request.repo_type == RepoType::Invalid {
            return Err(RequestError::validation(
                "repo",
                "unknown_repo_type",
                Some(request.repo),
            ));
        }
        Ok(request)
    }

    /// User who submitted the request.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Repository path, e.g. `tasks/graphs/bfs`.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Repository type derived from [`Request::repo`].
    #[must_use]
    pub const fn repo_type(&self) -> RepoType {
        self.repo_type
    }
}

fn required_string(value: Option<&Value>, field: &'static str) -> RequestResult<String> {
    let value = value.ok_or_else(|| RequestError::validation(field, "missing", None))?;
    value.as_str().map(str::to_string).ok_or_else(|| {
        RequestError::validation(field, "not_a_string", Some(kind_of(value).into()))
    })
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
