use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

/// Environment variable pointing at an alternative `opencli.toml`
pub const CONFIG_ENV: &str = "OPENCLI_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/opencli/opencli.toml";

/// Paths and knobs for every command, loaded once per invocation and handed
/// to the components that need them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Main panel configuration (`[DEFAULT]` section, `key=value` lines)
    pub panel_config: PathBuf,
    /// Reverse proxy template rewritten on ssl/port/openpanel_proxy updates
    pub proxy_template: PathBuf,
    /// Admin notification thresholds
    pub notifications_config: PathBuf,
    /// SQLite database holding admin accounts
    pub users_db: PathBuf,
    /// Per-user directories (cached `data.json`, `server_config.yml`)
    pub users_dir: PathBuf,
    pub version_file: PathBuf,
    pub admin_service: String,
    pub panel_service: String,
    pub admin_port: u16,
    pub public_ip_url: String,
    pub store_timeout_secs: u64,
    pub lock_timeout_secs: u64,
    /// Reload the panel service after configuration changes
    pub reload_services: bool,
    /// Where update-check notifications are appended
    pub notifications_log: PathBuf,
    /// Endpoint answering with the latest released version
    pub update_url: String,
    pub password_scheme: PasswordScheme,
    /// Panel helper printing the hash of its last argument, used by the
    /// `helper` scheme
    pub hash_command: Vec<String>,
}

/// How account passwords are hashed before they reach the user database
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    /// The panel's own hashing helper, so the AdminPanel login can verify it
    #[default]
    Helper,
    /// Argon2id computed in-process
    Argon2,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            panel_config: PathBuf::from("/usr/local/panel/conf/panel.config"),
            proxy_template: PathBuf::from("/usr/local/panel/templates/vhosts/openpanel_proxy.conf"),
            notifications_config: PathBuf::from("/usr/local/admin/service/notifications.ini"),
            users_db: PathBuf::from("/usr/local/admin/users.db"),
            users_dir: PathBuf::from("/usr/local/panel/core/users"),
            version_file: PathBuf::from("/usr/local/panel/version"),
            admin_service: "admin".to_string(),
            panel_service: "panel".to_string(),
            admin_port: 2087,
            public_ip_url: "https://ip.openpanel.co".to_string(),
            store_timeout_secs: 5,
            lock_timeout_secs: 5,
            reload_services: true,
            notifications_log: PathBuf::from("/usr/local/admin/logs/notifications.log"),
            update_url: "https://update.openpanel.co/".to_string(),
            password_scheme: PasswordScheme::Helper,
            hash_command: vec![
                "python3".to_string(),
                "/usr/local/admin/core/users/hash".to_string(),
            ],
        }
    }
}

impl CliConfig {
    /// Load the configuration: explicit path, then `$OPENCLI_CONFIG`, then the
    /// system-wide file. Falls back to defaults when none of them exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let system = Path::new(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Self::from_file(system);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opencli.toml");
        fs::write(
            &path,
            "users_db = \"/tmp/users.db\"\nreload_services = false\nhash_command = [\"/bin/hash\", \"--stdin\"]\n",
        )
        .unwrap();

        let cfg = CliConfig::from_file(&path).unwrap();
        assert_eq!(cfg.users_db, PathBuf::from("/tmp/users.db"));
        assert!(!cfg.reload_services);
        assert_eq!(cfg.hash_command, vec!["/bin/hash".to_string(), "--stdin".to_string()]);
        assert_eq!(cfg.password_scheme, PasswordScheme::Helper);
        assert_eq!(cfg.admin_port, 2087);
        assert_eq!(cfg.panel_config, CliConfig::default().panel_config);
    }

    #[test]
    fn argon2_is_an_explicit_opt_in() {
        let defaults = CliConfig::default();
        assert_eq!(defaults.password_scheme, PasswordScheme::Helper);
        assert_eq!(defaults.hash_command[1], "/usr/local/admin/core/users/hash");

        let cfg: CliConfig = toml::from_str("password_scheme = \"argon2\"\n").unwrap();
        assert_eq!(cfg.password_scheme, PasswordScheme::Argon2);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opencli.toml");
        fs::write(&path, "admin_port = \"not a number\"").unwrap();
        assert!(CliConfig::from_file(&path).is_err());
    }

    #[test]
    #[serial]
    fn env_var_is_used_when_no_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opencli.toml");
        fs::write(&path, "admin_port = 3000\n").unwrap();

        unsafe { env::set_var(CONFIG_ENV, &path) };
        let from_env = CliConfig::load(None);
        let explicit = CliConfig::load(Some(&path));
        unsafe { env::remove_var(CONFIG_ENV) };

        assert_eq!(from_env.unwrap().admin_port, 3000);
        assert_eq!(explicit.unwrap().admin_port, 3000);
    }
}
