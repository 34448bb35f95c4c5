//! Drains the requests directory.
//!
//! # Design
//! - A drain processes exactly the files listed at its start, in name order, one at a time.
//! - Every handled file is deleted whatever the outcome; a per-request failure is logged and
//!   the drain moves on.
//! - Only a deletion that would escape the requests directory aborts the drain.

use std::time::Instant;

use autoupdate_telemetry::{Metrics, RequestOutcomeLabel};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cooling::CoolingScheduler;
use crate::dispatch::{DispatchEngine, DispatchOutcome};
use crate::error::{RequestResult, StoreResult};
use crate::request::Request;
use crate::service::UpdateService;
use crate::store::{RequestFile, RequestStore};

/// Summary of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Files listed at drain start.
    pub found: usize,
    /// Requests that performed updates.
    pub applied: usize,
    /// Valid requests that needed no update.
    pub skipped: usize,
    /// Requests that failed at any stage.
    pub failed: usize,
}

/// Reads, validates, dispatches, and deletes request files.
#[derive(Debug)]
pub struct RequestHandler<S> {
    store: RequestStore,
    engine: DispatchEngine<S>,
    cooling: CoolingScheduler,
    metrics: Metrics,
}

impl<S: UpdateService> RequestHandler<S> {
    /// Assemble a handler.
    #[must_use]
    pub const fn new(
        store: RequestStore,
        engine: DispatchEngine<S>,
        cooling: CoolingScheduler,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            engine,
            cooling,
            metrics,
        }
    }

    /// Requests directory access.
    #[must_use]
    pub const fn store(&self) -> &RequestStore {
        &self.store
    }

    /// Dispatch engine.
    #[must_use]
    pub const fn engine(&self) -> &DispatchEngine<S> {
        &self.engine
    }

    /// Metrics updated by each drain.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Handle every request file currently in the directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be listed or a file resolves outside the
    /// requests directory at deletion; in the latter case the remaining files are left alone.
    pub async fn drain(&self) -> StoreResult<DrainReport> {
        let started = Instant::now();
        let files = self.store.list()?;
        let total = files.len();
        let mut report = DrainReport {
            found: total,
            ..DrainReport::default()
        };
        self.metrics.set_pending_requests(total);
        if total > 0 {
            info!(count = total, "found request files");
        }

        for (index, file) in files.iter().enumerate() {
            let label = match self.handle_request(file).await {
                Ok(outcome) if outcome.is_skip() => {
                    report.skipped += 1;
                    RequestOutcomeLabel::Skipped
                }
                Ok(_) => {
                    report.applied += 1;
                    RequestOutcomeLabel::Applied
                }
                Err(err) => {
                    error!(
                        file = %file.name(),
                        stage = err.stage().as_str(),
                        error = ?err,
                        "request failed"
                    );
                    report.failed += 1;
                    RequestOutcomeLabel::Failed
                }
            };
            self.metrics.inc_request(label);

            if let Err(err) = self.store.delete(file) {
                if err.is_fatal() {
                    self.metrics.inc_deletion_refused();
                }
                self.metrics.observe_drain(started.elapsed());
                return Err(err);
            }
            self.metrics.set_pending_requests(total - index - 1);
            info!(file = %file.name(), "finished {} of {}", index + 1, total);

            self.cooling.pause_after(index, total).await;
        }

        self.metrics.observe_drain(started.elapsed());
        if total > 0 {
            info!(
                found = report.found,
                applied = report.applied,
                skipped = report.skipped,
                failed = report.failed,
                "drain complete"
            );
        }
        Ok(report)
    }

    /// Read, validate, and dispatch one request file without deleting it.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the read, validation, or dispatch stage.
    pub async fn handle_request(&self, file: &RequestFile) -> RequestResult<DispatchOutcome> {
        let document = self.store.read(file).await?;
        let request = Request::from_document(&document)?;
        info!(
            file = %file.name(),
            user = request.user(),
            repo = request.repo(),
            "handling request"
        );
        let outcome = self.engine.dispatch(&request).await?;
        if outcome.is_skip() {
            warn!(file = %file.name(), repo = request.repo(), "request required no update");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RequestError, UpdateServiceError, UpdateServiceResult};
    use crate::resolver::TaskContestResolver;
    use crate::service::{ContestUpdate, TaskGeneration, UpdateScope};
    use anyhow::Result;
    use async_trait::async_trait;
    use autoupdate_config::{ActiveContests, LockSettings};
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct RefusingService;
    struct NoScope;

    #[async_trait]
    impl UpdateService for RefusingService {
        type Scope = NoScope;

        async fn enter(&self) -> UpdateServiceResult<NoScope> {
            Err(UpdateServiceError::Operation {
                operation: "enter",
                detail: "busy".to_string(),
            })
        }
    }

    #[async_trait]
    impl UpdateScope for NoScope {
        async fn update_contest(&mut self, _: &str, _: ContestUpdate) -> UpdateServiceResult<()> {
            Ok(())
        }

        async fn generate_task(&mut self, _: &str, _: TaskGeneration) -> UpdateServiceResult<()> {
            Ok(())
        }

        async fn update_users(&mut self) -> UpdateServiceResult<()> {
            Ok(())
        }
    }

    fn handler(dir: &std::path::Path) -> Result<RequestHandler<RefusingService>> {
        let store = RequestStore::open(
            dir,
            LockSettings {
                lifetime: Duration::from_secs(3),
                timeout: Duration::from_millis(200),
            },
        )?;
        let contests = Arc::new(ActiveContests::new(["contests/a"]));
        let resolver = TaskContestResolver::new(dir, Arc::clone(&contests));
        Ok(RequestHandler::new(
            store,
            DispatchEngine::new(RefusingService, contests, resolver),
            CoolingScheduler::new(Duration::ZERO),
            Metrics::new()?,
        ))
    }

    #[tokio::test]
    async fn failures_are_counted_and_files_deleted() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("1"), "user: a\nrepo: contests/a\n")?;
        fs::write(temp.path().join("2"), "not: [valid\n")?;
        fs::write(temp.path().join("3"), "user: a\nrepo: widgets/x\n")?;
        let handler = handler(temp.path())?;

        let report = handler.drain().await?;
        assert_eq!(
            report,
            DrainReport {
                found: 3,
                applied: 0,
                skipped: 0,
                failed: 3,
            }
        );
        assert!(handler.store().list()?.is_empty());

        let snapshot = handler.metrics().snapshot();
        assert_eq!(snapshot.requests_failed_total, 3);
        assert_eq!(snapshot.pending_requests, 0);
        assert_eq!(snapshot.drains_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn handle_request_reports_scope_failure_as_external() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("1"), "user: a\nrepo: users/all\n")?;
        let handler = handler(temp.path())?;
        let files = handler.store().list()?;

        let err = handler.handle_request(&files[0]).await.err();
        assert!(matches!(
            err,
            Some(RequestError::ExternalService {
                operation: "enter_scope",
                ..
            })
        ));
        assert!(files[0].path().exists());
        Ok(())
    }
}
