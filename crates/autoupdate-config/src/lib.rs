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

//! File-backed configuration for the request daemon.
//!
//! Layout: `model.rs` (typed config models), `validate.rs` (validation/parsing helpers),
//! `loader.rs` (YAML document loading), `defaults.rs` (fallback values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, ConfigLoader, parse_document};
pub use model::{ActiveContests, DaemonConfig, LockSettings, UpdaterCommand};
