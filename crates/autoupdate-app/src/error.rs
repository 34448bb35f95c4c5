//! # Design
//!
//! - Centralize application-level errors for bootstrap and the watch loop.
//! - Keep error messages constant while carrying an `operation` label for context.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: autoupdate_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: autoupdate_telemetry::TelemetryError,
    },
    /// The requests directory could not be opened.
    #[error("requests directory operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        source: autoupdate_requests::StoreError,
    },
    /// The watch loop stopped.
    #[error("request watch loop stopped")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watch error.
        source: autoupdate_requests::WatchError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: autoupdate_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: autoupdate_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn store(
        operation: &'static str,
        source: autoupdate_requests::StoreError,
    ) -> Self {
        Self::Store { operation, source }
    }

    pub(crate) const fn watch(
        operation: &'static str,
        source: autoupdate_requests::WatchError,
    ) -> Self {
        Self::Watch { operation, source }
    }
}
