//! Validation helpers turning raw document values into typed settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults::CONTEST_PREFIX;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ActiveContests, LockSettings};

/// Require an existing directory for `field`.
pub(crate) fn existing_dir(field: &'static str, value: Option<PathBuf>) -> ConfigResult<PathBuf> {
    let path = required_path(field, value)?;
    if !path.is_dir() {
        return Err(ConfigError::invalid(
            field,
            "not_a_directory",
            Some(path.display().to_string()),
        ));
    }
    Ok(path)
}

/// Require a non-empty path for `field`.
pub(crate) fn required_path(field: &'static str, value: Option<PathBuf>) -> ConfigResult<PathBuf> {
    let path = value.ok_or(ConfigError::MissingField { field })?;
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid(field, "empty", None));
    }
    Ok(path)
}

/// Convert a seconds value into a cooling interval.
pub(crate) fn cooling(value: f64) -> ConfigResult<Duration> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(
            "request_cooling_secs",
            "not_finite",
            Some(value.to_string()),
        ));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(
            "request_cooling_secs",
            "negative",
            Some(value.to_string()),
        ));
    }
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConfigError::invalid("request_cooling_secs", "out_of_range", Some(value.to_string()))
    })
}

/// Validate lock timings; both must be positive.
pub(crate) fn lock_settings(
    field: &'static str,
    lifetime_secs: u64,
    timeout_secs: u64,
) -> ConfigResult<LockSettings> {
    if lifetime_secs == 0 {
        return Err(ConfigError::invalid(field, "zero_lifetime", None));
    }
    if timeout_secs == 0 {
        return Err(ConfigError::invalid(field, "zero_timeout", None));
    }
    Ok(LockSettings {
        lifetime: Duration::from_secs(lifetime_secs),
        timeout: Duration::from_secs(timeout_secs),
    })
}

/// Validate active contest identifiers.
pub(crate) fn active_contests(values: Vec<String>) -> ConfigResult<ActiveContests> {
    for value in &values {
        let name = value.strip_prefix(CONTEST_PREFIX).ok_or_else(|| {
            ConfigError::invalid("active_contests", "not_a_contest_repo", Some(value.clone()))
        })?;
        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            return Err(ConfigError::invalid(
                "active_contests",
                "invalid_contest_name",
                Some(value.clone()),
            ));
        }
    }
    Ok(ActiveContests::new(values))
}

/// Require the updater program to be a non-empty path.
pub(crate) fn updater_program(program: &Path) -> ConfigResult<()> {
    if program.as_os_str().is_empty() {
        return Err(ConfigError::invalid("updater.program", "empty", None));
    }
    Ok(())
}
