//! YAML document loading.
//!
//! # Design
//! - Deserialize into a permissive raw document, then validate field by field so every
//!   failure names the offending field.
//! - The document path comes from `AUTOUPDATE_CONFIG`, falling back to a fixed default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{DaemonConfig, UpdaterCommand};
use crate::validate;

/// Environment variable naming the configuration document.
pub const CONFIG_PATH_ENV: &str = "AUTOUPDATE_CONFIG";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    requests_dir: Option<PathBuf>,
    clone_dir: Option<PathBuf>,
    #[serde(default = "default_cooling")]
    request_cooling_secs: f64,
    #[serde(default)]
    active_contests: Vec<String>,
    #[serde(default = "RawLock::request_defaults")]
    request_lock: RawLock,
    #[serde(default = "RawLock::update_defaults")]
    update_lock: RawLock,
    updater: Option<UpdaterCommand>,
    log_format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLock {
    lifetime_secs: u64,
    timeout_secs: u64,
}

impl RawLock {
    const fn request_defaults() -> Self {
        Self {
            lifetime_secs: defaults::REQUEST_LOCK_LIFETIME_SECS,
            timeout_secs: defaults::REQUEST_LOCK_TIMEOUT_SECS,
        }
    }

    const fn update_defaults() -> Self {
        Self {
            lifetime_secs: defaults::UPDATE_LOCK_LIFETIME_SECS,
            timeout_secs: defaults::UPDATE_LOCK_TIMEOUT_SECS,
        }
    }
}

const fn default_cooling() -> f64 {
    defaults::REQUEST_COOLING_SECS
}

/// Loads and validates [`DaemonConfig`] documents.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for an explicit document path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loader for the path named by `AUTOUPDATE_CONFIG`, or the default location.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Self::path_from_value(
            std::env::var(CONFIG_PATH_ENV).ok().as_deref(),
        ))
    }

    fn path_from_value(value: Option<&str>) -> PathBuf {
        value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(|| PathBuf::from(defaults::CONFIG_PATH), PathBuf::from)
    }

    /// Path of the document this loader reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse, and validate the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML for the expected
    /// shape, or any field fails validation.
    pub fn load(&self) -> ConfigResult<DaemonConfig> {
        let contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            operation: "config.read",
            path: self.path.clone(),
            source,
        })?;
        let raw: RawConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: Some(self.path.clone()),
                source,
            })?;
        let config = build(raw)?;
        info!(
            path = %self.path.display(),
            requests_dir = %config.requests_dir.display(),
            active_contests = config.active_contests.len(),
            "loaded daemon configuration"
        );
        Ok(config)
    }
}

/// Parse and validate a configuration document held in memory.
///
/// # Errors
///
/// Returns an error if the document is malformed or any field fails validation.
pub fn parse_document(contents: &str) -> ConfigResult<DaemonConfig> {
    let raw: RawConfig = serde_yaml::from_str(contents)
        .map_err(|source| ConfigError::Parse { path: None, source })?;
    build(raw)
}

fn build(raw: RawConfig) -> ConfigResult<DaemonConfig> {
    let requests_dir = validate::existing_dir("requests_dir", raw.requests_dir)?;
    let clone_dir = validate::required_path("clone_dir", raw.clone_dir)?;
    let request_cooling = validate::cooling(raw.request_cooling_secs)?;
    let active_contests = validate::active_contests(raw.active_contests)?;
    let request_lock = validate::lock_settings(
        "request_lock",
        raw.request_lock.lifetime_secs,
        raw.request_lock.timeout_secs,
    )?;
    let update_lock = validate::lock_settings(
        "update_lock",
        raw.update_lock.lifetime_secs,
        raw.update_lock.timeout_secs,
    )?;
    let updater = raw
        .updater
        .ok_or(ConfigError::MissingField { field: "updater" })?;
    validate::updater_program(&updater.program)?;

    Ok(DaemonConfig {
        requests_dir,
        clone_dir,
        request_cooling,
        active_contests,
        request_lock,
        update_lock,
        updater,
        log_format: raw.log_format,
    })
}
