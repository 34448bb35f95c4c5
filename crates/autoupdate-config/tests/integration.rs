use std::fs;
use std::time::Duration;

use autoupdate_config::{ConfigError, ConfigLoader, LockSettings};
use tempfile::TempDir;

fn write_config(temp: &TempDir, body: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = temp.path().join("config.yaml");
    fs::write(&path, body)?;
    Ok(path)
}

#[test]
fn loader_reads_full_document() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let requests = temp.path().join("requests");
    fs::create_dir_all(&requests)?;
    let path = write_config(
        &temp,
        &format!(
            "requests_dir: {requests}\n\
             clone_dir: {clones}\n\
             request_cooling_secs: 1.5\n\
             active_contests:\n  - contests/ioi2024\n  - contests/apio2024\n\
             request_lock: {{ lifetime_secs: 4, timeout_secs: 12 }}\n\
             updater:\n  program: /usr/local/bin/safe-updater\n  args: [--verbose]\n\
             log_format: json\n",
            requests = requests.display(),
            clones = temp.path().join("clones").display(),
        ),
    )?;

    let config = ConfigLoader::new(&path).load()?;
    assert_eq!(config.requests_dir, requests);
    assert_eq!(config.request_cooling, Duration::from_millis(1_500));
    assert_eq!(
        config.active_contests.iter().collect::<Vec<_>>(),
        vec!["contests/apio2024", "contests/ioi2024"]
    );
    assert_eq!(
        config.request_lock,
        LockSettings {
            lifetime: Duration::from_secs(4),
            timeout: Duration::from_secs(12),
        }
    );
    assert_eq!(config.update_lock.lifetime, Duration::from_secs(3600));
    assert_eq!(config.updater.args, vec!["--verbose".to_string()]);
    assert_eq!(config.log_format.as_deref(), Some("json"));
    Ok(())
}

#[test]
fn loader_applies_defaults() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = write_config(
        &temp,
        &format!(
            "requests_dir: {}\nclone_dir: /srv/clones\nupdater:\n  program: updater\n",
            temp.path().display()
        ),
    )?;

    let config = ConfigLoader::new(&path).load()?;
    assert_eq!(config.request_cooling, Duration::from_secs(5));
    assert!(config.active_contests.is_empty());
    assert_eq!(config.request_lock.lifetime, Duration::from_secs(3));
    assert_eq!(config.request_lock.timeout, Duration::from_secs(10));
    assert!(config.updater.args.is_empty());
    Ok(())
}

#[test]
fn loader_rejects_missing_requests_directory() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = write_config(
        &temp,
        &format!(
            "requests_dir: {}\nclone_dir: /srv/clones\nupdater:\n  program: updater\n",
            temp.path().join("absent").display()
        ),
    )?;

    let err = ConfigLoader::new(&path)
        .load()
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected missing directory error"))?;
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "requests_dir",
            reason: "not_a_directory",
            ..
        }
    ));
    Ok(())
}

#[test]
fn loader_reports_unreadable_document() {
    let err = ConfigLoader::new("/definitely/missing/autoupdate.yaml").load();
    assert!(matches!(
        err,
        Err(ConfigError::Io {
            operation: "config.read",
            ..
        })
    ));
}
