//! # Design
//!
//! - One error type for the daemon's observability setup: the log subscriber and the
//!   request metrics registry.
//! - Metric failures carry the collector name and the step that failed.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step of collector setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStep {
    /// Building the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
}

/// Errors raised while wiring logs and metrics for the daemon.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global log subscriber is already installed.
    #[error("log subscriber already installed")]
    LogSubscriber {
        /// Underlying installation error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A request metric could not be set up.
    #[error("request metric setup failed")]
    Collector {
        /// Metric name.
        metric: &'static str,
        /// Step that failed.
        step: CollectorStep,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The text exposition could not be produced.
    #[error("metrics exposition failed")]
    Exposition {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The text exposition was not UTF-8.
    #[error("metrics exposition was not utf-8")]
    ExpositionText {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
    /// The drain snapshot could not be encoded for the log.
    #[error("metrics snapshot encoding failed")]
    Snapshot {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl TelemetryError {
    pub(crate) const fn build(metric: &'static str, source: prometheus::Error) -> Self {
        Self::Collector {
            metric,
            step: CollectorStep::Build,
            source,
        }
    }

    pub(crate) const fn register(metric: &'static str, source: prometheus::Error) -> Self {
        Self::Collector {
            metric,
            step: CollectorStep::Register,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn collector_helpers_record_metric_and_step() {
        let built = TelemetryError::build("drains_total", prometheus::Error::Msg("bad".into()));
        assert!(matches!(
            built,
            TelemetryError::Collector {
                metric: "drains_total",
                step: CollectorStep::Build,
                ..
            }
        ));
        assert_eq!(built.to_string(), "request metric setup failed");
        assert!(built.source().is_some());

        let registered = TelemetryError::register(
            "pending_requests",
            prometheus::Error::AlreadyReg,
        );
        assert!(matches!(
            registered,
            TelemetryError::Collector {
                step: CollectorStep::Register,
                ..
            }
        ));
    }

    #[test]
    fn exposition_errors_keep_sources() {
        let text = String::from_utf8(vec![0xff])
            .map_err(|source| TelemetryError::ExpositionText { source })
            .err();
        assert!(text.is_some_and(|err| err.source().is_some()));

        let snapshot = serde_json::from_str::<u64>("nope")
            .map_err(|source| TelemetryError::Snapshot { source })
            .err();
        assert_eq!(
            snapshot.map(|err| err.to_string()).as_deref(),
            Some("metrics snapshot encoding failed")
        );
    }
}
