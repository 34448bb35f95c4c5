use std::sync::Arc;

use autoupdate_config::{ConfigLoader, DaemonConfig};
use autoupdate_requests::{
    CommandUpdateService, CoolingScheduler, DirectoryWatcher, DispatchEngine, RequestHandler,
    RequestStore, TaskContestResolver,
};
use autoupdate_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Environment variable overriding the configured log format.
pub const LOG_FORMAT_ENV: &str = "AUTOUPDATE_LOG_FORMAT";

/// Dependencies required to bootstrap the daemon.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig,
    config: DaemonConfig,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = ConfigLoader::from_env()
            .load()
            .map_err(|err| AppError::config("config.load", err))?;
        let logging = LoggingConfig::with_format(log_format(
            std::env::var(LOG_FORMAT_ENV).ok().as_deref(),
            config.log_format.as_deref(),
        ));
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            logging,
            config,
            metrics,
        })
    }
}

/// Entry point for the daemon: drain, then watch until a fatal error.
///
/// # Errors
///
/// Returns an error if dependency construction fails or the watch loop stops.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    autoupdate_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("watch");

    let BootstrapDependencies {
        logging: _,
        config,
        metrics,
    } = dependencies;

    info!(
        requests_dir = %config.requests_dir.display(),
        clone_dir = %config.clone_dir.display(),
        active_contests = config.active_contests.len(),
        cooling_ms = config.request_cooling.as_millis(),
        build_sha = autoupdate_telemetry::build_sha(),
        "request daemon starting"
    );

    let watcher = build_watcher(&config, metrics)?;
    let result = watcher
        .run()
        .await
        .map_err(|err| AppError::watch("watch.run", err));
    if let Err(err) = &result {
        error!(error = ?err, "request daemon stopped");
    }
    result
}

/// Wire the store, dispatch engine, and command updater from a validated configuration.
pub(crate) fn build_watcher(
    config: &DaemonConfig,
    metrics: Metrics,
) -> AppResult<DirectoryWatcher<CommandUpdateService>> {
    let store = RequestStore::open(&config.requests_dir, config.request_lock)
        .map_err(|err| AppError::store("requests.open", err))?;
    let contests = Arc::new(config.active_contests.clone());
    let resolver = TaskContestResolver::new(&config.clone_dir, Arc::clone(&contests));
    let service =
        CommandUpdateService::new(config.updater.clone(), &config.clone_dir, config.update_lock);
    let engine = DispatchEngine::new(service, contests, resolver);
    let handler = RequestHandler::new(
        store,
        engine,
        CoolingScheduler::new(config.request_cooling),
        metrics,
    );
    Ok(DirectoryWatcher::new(handler))
}

/// Environment override first, then the configured name, then the build default.
fn log_format(env_value: Option<&str>, configured: Option<&str>) -> LogFormat {
    env_value
        .filter(|value| !value.trim().is_empty())
        .or(configured)
        .and_then(LogFormat::parse)
        .unwrap_or_else(LogFormat::for_build)
}
