//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the request engine updates.

use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label recorded for each handled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcomeLabel {
    /// The request triggered at least one update-service call.
    Applied,
    /// The request was valid but concerned nothing active.
    Skipped,
    /// Reading, validating, or dispatching the request failed.
    Failed,
}

impl RequestOutcomeLabel {
    /// Label value used in the exposition format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across the daemon.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    requests_handled_total: IntCounterVec,
    drains_total: IntCounter,
    deletions_refused_total: IntCounter,
    pending_requests: IntGauge,
    last_drain_duration_ms: IntGauge,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Snapshot of the counters, logged after each drain.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Requests that triggered update-service calls.
    pub requests_applied_total: u64,
    /// Requests skipped because nothing active was concerned.
    pub requests_skipped_total: u64,
    /// Requests that failed at any stage.
    pub requests_failed_total: u64,
    /// Drain passes, including ones aborted by a refused deletion.
    pub drains_total: u64,
    /// Deletions refused by the directory guard.
    pub deletions_refused_total: u64,
    /// Request files left in the current drain.
    pub pending_requests: i64,
    /// Duration of the most recent drain (ms).
    pub last_drain_duration_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_handled_total = IntCounterVec::new(
            Opts::new(
                "requests_handled_total",
                "Request files handled, by outcome",
            ),
            &["outcome"],
        )
        .map_err(|source| collector("requests_handled_total", source))?;
        let drains_total = IntCounter::with_opts(Opts::new(
            "drains_total",
            "Passes over the requests directory, including aborted ones",
        ))
        .map_err(|source| collector("drains_total", source))?;
        let deletions_refused_total = IntCounter::with_opts(Opts::new(
            "deletions_refused_total",
            "Deletions refused because the target left the requests directory",
        ))
        .map_err(|source| collector("deletions_refused_total", source))?;
        let pending_requests = IntGauge::with_opts(Opts::new(
            "pending_requests",
            "Request files remaining in the current drain",
        ))
        .map_err(|source| collector("pending_requests", source))?;
        let last_drain_duration_ms = IntGauge::with_opts(Opts::new(
            "last_drain_duration_ms",
            "Duration of the most recent drain (ms)",
        ))
        .map_err(|source| collector("last_drain_duration_ms", source))?;

        register(
            &registry,
            "requests_handled_total",
            Box::new(requests_handled_total.clone()),
        )?;
        register(&registry, "drains_total", Box::new(drains_total.clone()))?;
        register(
            &registry,
            "deletions_refused_total",
            Box::new(deletions_refused_total.clone()),
        )?;
        register(
            &registry,
            "pending_requests",
            Box::new(pending_requests.clone()),
        )?;
        register(
            &registry,
            "last_drain_duration_ms",
            Box::new(last_drain_duration_ms.clone()),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                requests_handled_total,
                drains_total,
                deletions_refused_total,
                pending_requests,
                last_drain_duration_ms,
            }),
        })
    }

    /// Count one handled request with the given outcome.
    pub fn inc_request(&self, outcome: RequestOutcomeLabel) {
        self.inner
            .requests_handled_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record a finished or aborted drain and its duration.
    pub fn observe_drain(&self, duration: Duration) {
        self.inner.drains_total.inc();
        self.inner
            .last_drain_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Count a deletion refused by the directory guard.
    pub fn inc_deletion_refused(&self) {
        self.inner.deletions_refused_total.inc();
    }

    /// Set the pending request gauge.
    pub fn set_pending_requests(&self, count: usize) {
        self.inner
            .pending_requests
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionText { source })
    }

    /// Take a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let handled = |outcome: RequestOutcomeLabel| {
            self.inner
                .requests_handled_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            requests_applied_total: handled(RequestOutcomeLabel::Applied),
            requests_skipped_total: handled(RequestOutcomeLabel::Skipped),
            requests_failed_total: handled(RequestOutcomeLabel::Failed),
            drains_total: self.inner.drains_total.get(),
            deletions_refused_total: self.inner.deletions_refused_total.get(),
            pending_requests: self.inner.pending_requests.get(),
            last_drain_duration_ms: self.inner.last_drain_duration_ms.get(),
        }
    }

    /// Snapshot encoded as one JSON line for the drain log.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Snapshot`] if the snapshot cannot be serialised.
    pub fn snapshot_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()).map_err(|source| TelemetryError::Snapshot { source })
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::build(name, source)
}

fn register(
    registry: &Registry,
    name: &'static str,
    collector: Box<dyn prometheus::core::Collector>,
) -> Result<()> {
    registry
        .register(collector)
        .map_err(|source| TelemetryError::register(name, source))
}
