//! Default values applied when the configuration document omits a field.
//!
//! # Design
//! - Centralize defaults so the loader and tests agree on them.
//! - Keep time-based defaults explicit for auditability.

/// Location of the configuration document when `AUTOUPDATE_CONFIG` is unset.
pub const CONFIG_PATH: &str = "/etc/autoupdate/config.yaml";
/// Pause between two requests of the same drain, in seconds.
pub const REQUEST_COOLING_SECS: f64 = 5.0;
/// Lifetime of the requests directory lock, in seconds.
pub const REQUEST_LOCK_LIFETIME_SECS: u64 = 3;
/// How long to wait for the requests directory lock, in seconds.
pub const REQUEST_LOCK_TIMEOUT_SECS: u64 = 10;
/// Lifetime of the repository update lock, in seconds.
pub const UPDATE_LOCK_LIFETIME_SECS: u64 = 3600;
/// How long to wait for the repository update lock, in seconds.
pub const UPDATE_LOCK_TIMEOUT_SECS: u64 = 3600;
/// Prefix every active contest identifier must carry.
pub const CONTEST_PREFIX: &str = "contests/";
