//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was absent from the document.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The configuration document could not be parsed.
    #[error("invalid configuration document")]
    Parse {
        /// Path of the document when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            reason,
            value,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
