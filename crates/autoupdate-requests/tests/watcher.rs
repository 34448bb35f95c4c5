use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use autoupdate_config::ActiveContests;
use autoupdate_requests::{
    ContestUpdate, CoolingScheduler, DirectoryWatcher, DispatchEngine, RequestHandler,
    RequestStore, TaskContestResolver, WatchError,
};
use autoupdate_telemetry::Metrics;
use autoupdate_test_support::fixtures::{Workspace, quick_lock};
use autoupdate_test_support::mocks::{RecordingUpdateService, UpdateCall};
use notify::event::{AccessKind, AccessMode, CreateKind};
use notify::{Event, EventKind};
use tokio::sync::mpsc::unbounded_channel;

fn watcher(
    workspace: &Workspace,
    service: RecordingUpdateService,
) -> Result<DirectoryWatcher<RecordingUpdateService>> {
    let contests = Arc::new(ActiveContests::new(["contests/a"]));
    let store = RequestStore::open(workspace.requests_dir(), quick_lock())?;
    let resolver = TaskContestResolver::new(workspace.clone_dir(), Arc::clone(&contests));
    Ok(DirectoryWatcher::new(RequestHandler::new(
        store,
        DispatchEngine::new(service, contests, resolver),
        CoolingScheduler::new(Duration::ZERO),
        Metrics::new()?,
    )))
}

fn close_write(path: PathBuf) -> notify::Result<Event> {
    Ok(Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write))).add_path(path))
}

#[tokio::test]
async fn queued_signals_collapse_into_one_drain() -> Result<()> {
    let workspace = Workspace::new()?;
    let service = RecordingUpdateService::new();
    let watcher = watcher(&workspace, service.clone())?;
    let first = workspace.write_request("0001", "alice", "contests/a")?;
    let second = workspace.write_request("0002", "alice", "contests/a")?;

    let (tx, rx) = unbounded_channel();
    tx.send(close_write(first))?;
    tx.send(close_write(second))?;
    drop(tx);

    let result = watcher.watch_signals(rx).await;
    assert!(matches!(result, Err(WatchError::Closed)));
    assert_eq!(service.calls().len(), 2);
    assert_eq!(watcher.handler().metrics().snapshot().drains_total, 1);
    assert!(workspace.remaining_requests()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn lock_and_create_events_do_not_drain() -> Result<()> {
    let workspace = Workspace::new()?;
    let service = RecordingUpdateService::new();
    let watcher = watcher(&workspace, service.clone())?;
    let pending = workspace.write_request("0001", "alice", "contests/a")?;

    let (tx, rx) = unbounded_channel();
    tx.send(close_write(workspace.requests_dir().join(".lock")))?;
    tx.send(Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(pending)))?;
    drop(tx);

    let result = watcher.watch_signals(rx).await;
    assert!(matches!(result, Err(WatchError::Closed)));
    assert!(service.journal().is_empty());
    assert_eq!(workspace.remaining_requests()?, vec!["0001"]);
    Ok(())
}

#[tokio::test]
async fn backend_errors_trigger_a_rescan() -> Result<()> {
    let workspace = Workspace::new()?;
    let service = RecordingUpdateService::new();
    let watcher = watcher(&workspace, service.clone())?;
    workspace.write_request("0001", "alice", "contests/a")?;

    let (tx, rx) = unbounded_channel();
    tx.send(Err(notify::Error::generic("queue overflow")))?;
    drop(tx);

    let _ = watcher.watch_signals(rx).await;
    assert_eq!(
        service.calls(),
        vec![UpdateCall::contest("contests/a", ContestUpdate::FULL)]
    );
    Ok(())
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn run_drains_existing_files_then_reacts_to_new_ones() -> Result<()> {
    let workspace = Workspace::new()?;
    let service = RecordingUpdateService::new();
    let watcher = watcher(&workspace, service.clone())?;
    workspace.write_request("0001", "alice", "contests/a")?;

    let observe = async {
        wait_for(|| service.calls().len() == 1).await?;
        workspace.write_request("0002", "alice", "users/all")?;
        wait_for(|| service.calls().len() == 3).await?;
        anyhow::Ok(())
    };

    tokio::select! {
        result = watcher.run() => anyhow::bail!("watcher stopped: {result:?}"),
        observed = observe => observed?,
    }
    assert_eq!(
        service.calls(),
        vec![
            UpdateCall::contest("contests/a", ContestUpdate::FULL),
            UpdateCall::UpdateUsers,
            UpdateCall::contest("contests/a", ContestUpdate::WITHOUT_USERS),
        ]
    );
    Ok(())
}

#[cfg(target_os = "linux")]
async fn wait_for(mut condition: impl FnMut() -> bool) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;
    Ok(())
}
