#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the autoupdate workspace.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (process span guard),
//! `metrics.rs` (Prometheus counters for request handling), `error.rs`.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::GlobalContextGuard;
pub use error::{CollectorStep, Result, TelemetryError};
pub use init::{DEFAULT_DIRECTIVE, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot, RequestOutcomeLabel};
