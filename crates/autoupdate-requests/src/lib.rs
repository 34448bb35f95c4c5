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

//! Request processing engine: watches a requests directory, drains request files in order,
//! and drives an update service for each one.
//!
//! Layout: `store.rs` (listing, locked reads, confined deletion), `request.rs` (descriptor
//! validation), `resolver.rs` (task to contest lookup), `dispatch.rs` (update decisions),
//! `handler.rs` (drain loop), `watcher.rs` (notification loop), `command.rs` (updater
//! program service), `lock.rs` (lock files), `cooling.rs` (inter-request pause).

pub mod command;
pub mod cooling;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod lock;
pub mod request;
pub mod resolver;
pub mod service;
pub mod store;
pub mod watcher;

pub use command::{CommandScope, CommandUpdateService};
pub use cooling::CoolingScheduler;
pub use dispatch::{DispatchEngine, DispatchOutcome};
pub use error::{
    LockError, LockResult, RequestError, RequestResult, RequestStage, StoreError, StoreResult,
    UpdateServiceError, UpdateServiceResult, WatchError, WatchResult,
};
pub use handler::{DrainReport, RequestHandler};
pub use lock::{LockFile, LockGuard};
pub use request::{RepoType, Request};
pub use resolver::{ContestManifest, MANIFEST_FILE, ManifestTask, TaskContestResolver};
pub use service::{ContestUpdate, TaskGeneration, UpdateScope, UpdateService};
pub use store::{LOCK_FILE_NAME, RequestFile, RequestStore};
pub use watcher::{DirectoryWatcher, WatchSignal, is_drain_trigger};
