#![cfg(target_os = "linux")]

use std::fs;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use autoupdate_test_support::fixtures::Workspace;
use tokio::process::Command;
use tokio::time::timeout;

fn write_config(workspace: &Workspace) -> Result<std::path::PathBuf> {
    let log = workspace.root().join("updater.log");
    let path = workspace.root().join("config.yaml");
    fs::write(
        &path,
        format!(
            "requests_dir: {}\n\
             clone_dir: {}\n\
             request_cooling_secs: 0.0\n\
             active_contests: [contests/a]\n\
             updater:\n\
             \x20 program: sh\n\
             \x20 args: ['-c', 'echo \"$@\" >> {}', updater]\n\
             log_format: json\n",
            workspace.requests_dir().display(),
            workspace.clone_dir().display(),
            log.display()
        ),
    )?;
    Ok(path)
}

async fn run_daemon(config: &Path) -> Result<Output> {
    let child = Command::new(env!("CARGO_BIN_EXE_autoupdate"))
        .env("AUTOUPDATE_CONFIG", config)
        .env("RUST_LOG", "info")
        .kill_on_drop(true)
        .output();
    Ok(timeout(Duration::from_secs(20), child).await??)
}

#[tokio::test]
async fn escaping_request_stops_daemon_with_failure_status() -> Result<()> {
    let workspace = Workspace::new()?;
    let config = write_config(&workspace)?;
    workspace.write_request("0001", "alice", "contests/a")?;
    let outside = workspace.root().join("outside.yaml");
    fs::write(&outside, "user: mallory\nrepo: contests/b\n")?;
    std::os::unix::fs::symlink(&outside, workspace.requests_dir().join("0002"))?;

    let output = run_daemon(&config).await?;
    assert_eq!(output.status.code(), Some(1));
    assert!(outside.exists());
    assert_eq!(workspace.remaining_requests()?, vec!["0002"]);

    let calls = fs::read_to_string(workspace.root().join("updater.log"))?;
    assert_eq!(
        calls.lines().collect::<Vec<_>>(),
        vec!["update-contest contests/a --update --generate-new --update-users"]
    );
    Ok(())
}

#[tokio::test]
async fn missing_configuration_fails_fast() -> Result<()> {
    let workspace = Workspace::new()?;
    let output = run_daemon(&workspace.root().join("absent.yaml")).await?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config.read"));
    Ok(())
}
