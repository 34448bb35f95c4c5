//! Directory watch loop.
//!
//! # Design
//! - `notify` events are forwarded from the backend callback into a tokio channel and reduced
//!   to a level-triggered "rescan" signal; queued signals collapse into one drain.
//! - The watch is registered before the initial drain so files written during it are not
//!   missed.
//! - Backend errors and overflow notices are treated as a rescan request.

use std::ffi::OsStr;
use std::path::PathBuf;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, error, info, warn};

use crate::error::{WatchError, WatchResult};
use crate::handler::RequestHandler;
use crate::service::UpdateService;
use crate::store::LOCK_FILE_NAME;

/// Raw notification as delivered by the backend.
pub type WatchSignal = notify::Result<Event>;

/// Whether a notification should start a drain.
#[must_use]
pub fn is_drain_trigger(signal: &WatchSignal) -> bool {
    let event = match signal {
        Ok(event) => event,
        Err(_) => return true,
    };
    if event.need_rescan() {
        return true;
    }
    let completes_file = matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    );
    completes_file
        && (event.paths.is_empty()
            || event
                .paths
                .iter()
                .any(|path| path.file_name() != Some(OsStr::new(LOCK_FILE_NAME))))
}

/// Watches the requests directory and drains it on every change.
#[derive(Debug)]
pub struct DirectoryWatcher<S> {
    handler: RequestHandler<S>,
}

impl<S: UpdateService> DirectoryWatcher<S> {
    /// Watcher driving `handler`.
    #[must_use]
    pub const fn new(handler: RequestHandler<S>) -> Self {
        Self { handler }
    }

    /// Handler invoked for each drain.
    #[must_use]
    pub const fn handler(&self) -> &RequestHandler<S> {
        &self.handler
    }

    /// Register the directory watch, drain once, then drain on every notification.
    ///
    /// Only returns on a fatal drain failure or when notifications stop.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Backend`] when the watch cannot be registered,
    /// [`WatchError::Drain`] on a fatal drain failure, and [`WatchError::Closed`] when the
    /// backend goes away.
    pub async fn run(self) -> WatchResult<()> {
        let dir: PathBuf = self.handler.store().dir().to_path_buf();
        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |signal: WatchSignal| {
            // The receiver only disappears when the loop is shutting down.
            let _ = tx.send(signal);
        })
        .map_err(|source| WatchError::Backend {
            path: dir.clone(),
            source,
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Backend {
                path: dir.clone(),
                source,
            })?;
        info!(requests_dir = %dir.display(), "watching requests directory");

        self.drain_once().await?;
        let result = self.watch_signals(rx).await;
        drop(watcher);
        result
    }

    /// Drain on each batch of signals received from `signals` until it closes.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Drain`] on a fatal drain failure and [`WatchError::Closed`] once
    /// every sender is gone.
    pub async fn watch_signals(
        &self,
        mut signals: UnboundedReceiver<WatchSignal>,
    ) -> WatchResult<()> {
        while let Some(first) = signals.recv().await {
            let mut triggered = self.inspect(&first);
            while let Ok(next) = signals.try_recv() {
                triggered |= self.inspect(&next);
            }
            if triggered {
                self.drain_once().await?;
            }
        }
        Err(WatchError::Closed)
    }

    fn inspect(&self, signal: &WatchSignal) -> bool {
        match signal {
            Ok(event) => debug!(kind = ?event.kind, paths = ?event.paths, "directory event"),
            Err(err) => warn!(
                requests_dir = %self.handler.store().dir().display(),
                error = %err,
                "directory watch error; rescanning"
            ),
        }
        is_drain_trigger(signal)
    }

    /// Run one drain, logging non-fatal failures.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Drain`] when the drain hit a fatal store error.
    pub async fn drain_once(&self) -> WatchResult<()> {
        match self.handler.drain().await {
            Ok(report) => {
                if report.found > 0 {
                    match self.handler.metrics().snapshot_json() {
                        Ok(encoded) => debug!(metrics = %encoded, "metrics after drain"),
                        Err(err) => debug!(error = %err, "failed to encode metrics snapshot"),
                    }
                }
                Ok(())
            }
            Err(source) if source.is_fatal() => {
                error!(error = ?source, "fatal error while draining requests");
                Err(WatchError::Drain { source })
            }
            Err(err) => {
                error!(error = ?err, "drain failed; waiting for the next change");
                Ok(())
            }
        }
    }
}
