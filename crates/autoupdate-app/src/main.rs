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

//! Binary entrypoint: loads the configuration, drains the requests directory, and watches it
//! until a fatal error.

use autoupdate_app::{AppResult, run_app};

/// Runs the request daemon; returns only on failure, which exits with status 1.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
