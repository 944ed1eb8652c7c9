use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::document::ConfigDocument;
use super::error::{ConfigError, Result};
use crate::common::atomic_file::{FileLock, write_atomic};
use crate::ui::prelude::*;

/// A flat `key=value` file edited in place.
///
/// Reads take no lock; the file is only ever replaced by rename, so a reader
/// sees either the old or the new content.
#[derive(Debug, Clone)]
pub struct KeyValueConfigStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl KeyValueConfigStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ConfigDocument> {
        let text = fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        Ok(ConfigDocument::parse(&text))
    }

    pub fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        let doc = self.load()?;
        doc.get(key)
            .map(str::to_string)
            .ok_or_else(|| self.not_found(key))
    }

    /// Rewrite the first `key=` line. Nothing is written when the key is absent.
    pub fn update(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        if value.contains(['\n', '\r']) {
            return Err(ConfigError::InvalidValue(key.to_string()));
        }
        if !self.path.is_file() {
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }

        let lock = FileLock::acquire(&self.path, self.lock_timeout)?;
        let mut doc = self.load()?;
        if !doc.set(key, value) {
            return Err(self.not_found(key));
        }
        write_atomic(&self.path, &doc.render())?;

        emit(
            Level::Debug,
            "config.written",
            &format!("Rewrote {} under {}", self.path.display(), lock.path().display()),
            None,
        );
        Ok(())
    }

    fn not_found(&self, key: &str) -> ConfigError {
        ConfigError::KeyNotFound {
            key: key.to_string(),
            path: self.path.clone(),
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['=', '\n', '\r']) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(contents: &str) -> (tempfile::TempDir, KeyValueConfigStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.config");
        fs::write(&path, contents).unwrap();
        let store = KeyValueConfigStore::new(path, Duration::from_secs(1));
        (dir, store)
    }

    #[test]
    fn update_then_get_returns_new_value() {
        let original = "# comment\n[DEFAULT]\nssl=no\nport=8080\n\nautoupdate=on\n";
        let (_dir, store) = store_with(original);

        store.update("port", "9090").unwrap();

        assert_eq!(store.get("port").unwrap(), "9090");
        let after = fs::read_to_string(store.path()).unwrap();
        assert_eq!(after, original.replace("port=8080", "port=9090"));
    }

    #[test]
    fn update_of_missing_key_leaves_file_untouched() {
        let original = "ssl=no\nport=8080";
        let (_dir, store) = store_with(original);

        let err = store.update("missing", "1").unwrap_err();

        assert!(matches!(err, ConfigError::KeyNotFound { .. }));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn get_missing_key_and_missing_file() {
        let (dir, store) = store_with("ssl=no\n");
        assert!(matches!(
            store.get("port"),
            Err(ConfigError::KeyNotFound { .. })
        ));

        let gone = KeyValueConfigStore::new(dir.path().join("nope"), Duration::from_secs(1));
        assert!(matches!(gone.get("ssl"), Err(ConfigError::FileNotFound(_))));
        assert!(matches!(
            gone.update("ssl", "yes"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn rejects_keys_and_values_that_would_break_the_line_model() {
        let (_dir, store) = store_with("ssl=no\n");
        assert!(matches!(store.get("a=b"), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(store.get(""), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(
            store.update("ssl", "yes\nport=1"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert_eq!(store.get("ssl").unwrap(), "no");
    }

    #[test]
    fn prefix_of_another_key_does_not_match() {
        let (_dir, store) = store_with("ssl_cert=/etc/x\nssl=no\n");
        store.update("ssl", "yes").unwrap();
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "ssl_cert=/etc/x\nssl=yes\n"
        );
    }
}
