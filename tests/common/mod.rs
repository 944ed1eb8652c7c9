use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PANEL_CONFIG: &str = "[DEFAULT]\n\
# panel settings\n\
ssl=no\n\
port=2083\n\
force_domain=\n\
openpanel_proxy=openpanel\n\
autoupdate=on\n\
\n\
[USERS]\n\
password_reset=no\n";

pub const PROXY_TEMPLATE: &str = "location /openpanel {\n    proxy_pass http://127.0.0.1:2083;\n}\n";

pub const NOTIFICATIONS: &str = "[PREFERENCES]\nload=20\ncpu=90\nram=85\n";

/// Throwaway panel layout plus an `opencli.toml` pointing into it
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let env = Self { temp_dir };

        fs::create_dir_all(env.path().join("users"))?;
        fs::write(env.panel_config(), PANEL_CONFIG)?;
        fs::write(env.proxy_template(), PROXY_TEMPLATE)?;
        fs::write(env.notifications(), NOTIFICATIONS)?;
        fs::write(env.path().join("version"), "0.2.1\n")?;

        let config = format!(
            "panel_config = {:?}\n\
             proxy_template = {:?}\n\
             notifications_config = {:?}\n\
             users_db = {:?}\n\
             users_dir = {:?}\n\
             version_file = {:?}\n\
             admin_service = \"opencli-test-admin-missing\"\n\
             public_ip_url = \"http://127.0.0.1:9/\"\n\
             store_timeout_secs = 1\n\
             lock_timeout_secs = 1\n\
             reload_services = false\n\
             hash_command = [\"sh\", \"-c\", \"echo hashed-$0\"]\n\
             notifications_log = {:?}\n\
             update_url = \"http://127.0.0.1:9/\"\n",
            env.panel_config(),
            env.proxy_template(),
            env.notifications(),
            env.users_db(),
            env.path().join("users"),
            env.path().join("version"),
            env.notifications_log(),
        );
        fs::write(env.config_file(), config)?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_file(&self) -> PathBuf {
        self.path().join("opencli.toml")
    }

    pub fn panel_config(&self) -> PathBuf {
        self.path().join("panel.config")
    }

    pub fn proxy_template(&self) -> PathBuf {
        self.path().join("openpanel_proxy.conf")
    }

    pub fn notifications(&self) -> PathBuf {
        self.path().join("notifications.ini")
    }

    pub fn notifications_log(&self) -> PathBuf {
        self.path().join("notifications.log")
    }

    pub fn users_db(&self) -> PathBuf {
        self.path().join("users.db")
    }

    /// Create `users/<name>/` with the given files
    pub fn add_hosting_user(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
        let dir = self.path().join("users").join(name);
        fs::create_dir_all(&dir)?;
        for (file, content) in files {
            fs::write(dir.join(file), content)?;
        }
        Ok(dir)
    }
}
