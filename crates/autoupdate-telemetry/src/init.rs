//! Log subscriber installation for the daemon.
//!
//! # Design
//! - One registry with an `EnvFilter` and a single output layer, JSON for log shippers or
//!   compact lines for terminals.
//! - `RUST_LOG` overrides the default directive.
//! - The build SHA is recorded by the first installation and shown in the process span.

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::error::{Result, TelemetryError};

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// How the daemon's logs are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive applied when `RUST_LOG` is absent.
    pub default_directive: &'static str,
    /// Build identifier attached to the process span.
    pub build_sha: &'static str,
}

impl LoggingConfig {
    /// Logging in `format` with the default directive and the compiled-in build SHA.
    #[must_use]
    pub const fn with_format(format: LogFormat) -> Self {
        Self {
            format,
            default_directive: DEFAULT_DIRECTIVE,
            build_sha: match option_env!("AUTOUPDATE_BUILD_SHA") {
                Some(sha) => sha,
                None => "dev",
            },
        }
    }
}

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with the current span flattened in.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    #[must_use]
    pub const fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse a format name, case-insensitively; `None` for unknown names.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Install the global log subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::LogSubscriber`] when a global subscriber already exists.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // First installation wins.
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive));
    tracing_subscriber::registry()
        .with(output_layer(config.format))
        .with(filter)
        .try_init()
        .map_err(|source| TelemetryError::LogSubscriber { source })
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_target(false);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => layer.compact().boxed(),
    }
}

/// Build SHA recorded at installation, `dev` before that.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}
