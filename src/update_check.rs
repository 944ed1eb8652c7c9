//! `opencli update-check`: compare the installed panel version with the
//! latest release and leave an unread notification for the AdminPanel.

use anyhow::{Context, Result};
use serde_json::json;
use std::cmp::Ordering;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::common::atomic_file::FileLock;
use crate::common::config::CliConfig;
use crate::common::network::fetch_text;
use crate::ui::prelude::*;
use crate::version::installed_version;

const UPDATE_TITLE: &str = "New OpenPanel update is available";
const FAILURE_TITLE: &str = "Update check failed";

/// Answers with the newest released version
pub trait LatestVersionSource {
    fn latest_version(&self) -> Result<String>;
}

pub struct HttpVersionSource {
    url: String,
    timeout: Duration,
}

impl HttpVersionSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl LatestVersionSource for HttpVersionSource {
    fn latest_version(&self) -> Result<String> {
        let version = fetch_text(&self.url, self.timeout)?;
        if version.is_empty() {
            anyhow::bail!("No version returned by {}", self.url);
        }
        Ok(version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    LocalNewer,
    UpdateAvailable,
}

impl UpdateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::UpToDate => "Up to date",
            UpdateStatus::LocalNewer => "Local version is greater",
            UpdateStatus::UpdateAvailable => "Update available",
        }
    }
}

/// Dotted versions compare numerically segment by segment (`0.1.10` is newer
/// than `0.1.9`); segments that are not numbers compare as text.
pub fn compare_versions(installed: &str, latest: &str) -> Ordering {
    let mut a = installed.trim().split('.');
    let mut b = latest.trim().split('.');
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

pub fn status_for(installed: &str, latest: &str) -> UpdateStatus {
    match compare_versions(installed, latest) {
        Ordering::Equal => UpdateStatus::UpToDate,
        Ordering::Greater => UpdateStatus::LocalNewer,
        Ordering::Less => UpdateStatus::UpdateAvailable,
    }
}

fn notification_body(title: &str, message: &str) -> String {
    format!("UNREAD {} MESSAGE: {}", title, message)
}

/// Append `<timestamp> UNREAD <title> MESSAGE: <message>` unless the same
/// unread notification is already in the log. Returns whether a line was
/// written.
pub fn append_notification(
    log: &Path,
    title: &str,
    message: &str,
    timestamp: &str,
    lock_timeout: Duration,
) -> Result<bool> {
    let body = notification_body(title, message);
    let _lock = FileLock::acquire(log, lock_timeout)?;

    let existing = match fs::read_to_string(log) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("reading {}", log.display())),
    };
    if existing.lines().any(|line| line.trim_end().ends_with(&body)) {
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .with_context(|| format!("opening {}", log.display()))?;
    writeln!(file, "{} {}", timestamp, body)
        .with_context(|| format!("writing {}", log.display()))?;
    Ok(true)
}

fn notify(config: &CliConfig, title: &str, message: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    match append_notification(
        &config.notifications_log,
        title,
        message,
        &timestamp,
        config.lock_timeout(),
    ) {
        Ok(written) => emit(
            Level::Debug,
            "update.notification",
            &format!("Notification '{}' written: {}", title, written),
            None,
        ),
        Err(e) => emit(
            Level::Warn,
            "update.notification_failed",
            &format!("Could not record notification: {:#}", e),
            None,
        ),
    }
}

pub fn run_update_check(config: &CliConfig, source: &dyn LatestVersionSource) -> Result<()> {
    let installed = installed_version(&config.version_file)?;

    let latest = match source.latest_version() {
        Ok(v) => v,
        Err(e) => {
            notify(
                config,
                FAILURE_TITLE,
                &format!("Failed connecting to {}", config.update_url),
            );
            return Err(e.context("Error fetching remote version"));
        }
    };

    let status = status_for(&installed, &latest);
    if status != UpdateStatus::UpToDate {
        notify(
            config,
            UPDATE_TITLE,
            &format!("Installed version: {} | Available version: {}", installed, latest),
        );
    }

    let data = match status {
        UpdateStatus::UpToDate => json!({
            "status": status.as_str(),
            "installed_version": installed,
        }),
        _ => json!({
            "status": status.as_str(),
            "installed_version": installed,
            "latest_version": latest,
        }),
    };
    let message = match status {
        UpdateStatus::UpToDate => format!("{} ({})", status.as_str(), installed),
        _ => format!("{}: installed {}, latest {}", status.as_str(), installed, latest),
    };
    emit(Level::Info, "update.status", &message, Some(data));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(1);

    struct Fixed(Option<&'static str>);

    impl LatestVersionSource for Fixed {
        fn latest_version(&self) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn config_in(dir: &Path, installed: &str) -> CliConfig {
        fs::write(dir.join("version"), installed).unwrap();
        CliConfig {
            version_file: dir.join("version"),
            notifications_log: dir.join("notifications.log"),
            lock_timeout_secs: 1,
            ..CliConfig::default()
        }
    }

    #[test]
    fn versions_compare_by_number() {
        assert_eq!(status_for("0.2.1", "0.2.1"), UpdateStatus::UpToDate);
        assert_eq!(status_for("0.1.9", "0.1.10"), UpdateStatus::UpdateAvailable);
        assert_eq!(status_for("1.0.0", "0.9.9"), UpdateStatus::LocalNewer);
        assert_eq!(status_for("0.2", "0.2.1"), UpdateStatus::UpdateAvailable);
        assert_eq!(compare_versions("0.2.1-beta", "0.2.1-alpha"), Ordering::Greater);
    }

    #[test]
    fn identical_unread_notification_is_written_once() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("notifications.log");

        assert!(append_notification(&log, UPDATE_TITLE, "a | b", "2024-01-01 10:00:00", TIMEOUT).unwrap());
        assert!(!append_notification(&log, UPDATE_TITLE, "a | b", "2024-01-02 10:00:00", TIMEOUT).unwrap());
        assert!(append_notification(&log, UPDATE_TITLE, "a | c", "2024-01-03 10:00:00", TIMEOUT).unwrap());

        let text = fs::read_to_string(&log).unwrap();
        assert_eq!(
            text,
            "2024-01-01 10:00:00 UNREAD New OpenPanel update is available MESSAGE: a | b\n\
             2024-01-03 10:00:00 UNREAD New OpenPanel update is available MESSAGE: a | c\n"
        );
    }

    #[test]
    fn read_notifications_do_not_block_a_new_one() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("notifications.log");
        fs::write(&log, "2024-01-01 10:00:00 READ New OpenPanel update is available MESSAGE: a | b\n").unwrap();

        assert!(append_notification(&log, UPDATE_TITLE, "a | b", "2024-01-02 10:00:00", TIMEOUT).unwrap());
    }

    #[test]
    fn available_update_is_recorded() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "0.2.1\n");

        run_update_check(&config, &Fixed(Some("0.2.5"))).unwrap();
        run_update_check(&config, &Fixed(Some("0.2.5"))).unwrap();

        let log = fs::read_to_string(&config.notifications_log).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("MESSAGE: Installed version: 0.2.1 | Available version: 0.2.5"));
    }

    #[test]
    fn up_to_date_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "0.2.1\n");

        run_update_check(&config, &Fixed(Some("0.2.1"))).unwrap();
        assert!(!config.notifications_log.exists());
    }

    #[test]
    fn failed_fetch_is_an_error_and_a_notification() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), "0.2.1\n");

        assert!(run_update_check(&config, &Fixed(None)).is_err());
        let log = fs::read_to_string(&config.notifications_log).unwrap();
        assert!(log.contains("UNREAD Update check failed MESSAGE: Failed connecting to https://update.openpanel.co/"));
    }
}
