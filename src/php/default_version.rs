//! The `default_php_version: phpX.Y` directive of a user's `server_config.yml`.

use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::atomic_file::{FileLock, write_atomic};
use crate::kvconfig::ConfigError;
use crate::kvconfig::error::Result;

const KEY: &str = "default_php_version";
const SERVER_CONFIG: &str = "server_config.yml";

fn directive() -> Result<Regex> {
    Regex::new(r"(default_php_version:\s*)php([0-9.]+)").map_err(|e| ConfigError::Other(e.into()))
}

pub fn server_config_path(users_dir: &Path, username: &str) -> PathBuf {
    users_dir.join(username).join(SERVER_CONFIG)
}

/// `X.Y` with single digits, e.g. `8.1` or `5.6`
pub fn validate_version(version: &str) -> Result<()> {
    let format = Regex::new(r"^[0-9]\.[0-9]$").map_err(|e| ConfigError::Other(e.into()))?;
    if !format.is_match(version) {
        return Err(ConfigError::Rejected {
            key: KEY.to_string(),
            value: version.to_string(),
            reason: "use the format 'number.number' (e.g. 8.1 or 5.6)",
        });
    }
    Ok(())
}

pub fn read_default_version(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    directive()?
        .captures(&content)
        .map(|caps| caps[2].to_string())
        .ok_or_else(|| ConfigError::KeyNotFound {
            key: KEY.to_string(),
            path: path.to_path_buf(),
        })
}

/// Rewrite every `default_php_version: phpX.Y` directive. The file is left
/// alone when it has none.
pub fn update_default_version(path: &Path, version: &str, lock_timeout: Duration) -> Result<()> {
    validate_version(version)?;
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let _lock = FileLock::acquire(path, lock_timeout)?;
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let re = directive()?;
    if !re.is_match(&content) {
        return Err(ConfigError::KeyNotFound {
            key: KEY.to_string(),
            path: path.to_path_buf(),
        });
    }
    let updated = re.replace_all(&content, |caps: &Captures<'_>| {
        format!("{}php{}", &caps[1], version)
    });
    write_atomic(path, &updated)?;
    Ok(())
}
