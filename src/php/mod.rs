pub mod default_version;

use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::json;

use crate::common::config::CliConfig;
use crate::ui::prelude::*;
use crate::users::models::validate_username;

#[derive(Subcommand, Debug)]
pub enum PhpCommands {
    /// View or change the default PHP version used for a user's new domains
    DefaultVersion {
        username: String,
        /// New default version, e.g. 8.2
        #[arg(long, value_name = "VERSION")]
        update: Option<String>,
    },
}

pub fn handle_php_command(command: &PhpCommands, config: &CliConfig) -> Result<()> {
    match command {
        PhpCommands::DefaultVersion { username, update } => {
            if !validate_username(username) || username.contains('/') || username.starts_with('.') {
                bail!("Invalid username '{}'", username);
            }
            let path = default_version::server_config_path(&config.users_dir, username);

            match update {
                Some(version) => {
                    default_version::update_default_version(&path, version, config.lock_timeout())?;
                    emit(
                        Level::Success,
                        "php.default_updated",
                        &format!(
                            "Default PHP version for user '{}' updated to: {}",
                            username, version
                        ),
                        Some(json!({ "username": username, "version": version })),
                    );
                }
                None => {
                    let version = default_version::read_default_version(&path)?;
                    emit(
                        Level::Info,
                        "php.default_version",
                        &format!("Default PHP version for user '{}' is: {}", username, version),
                        Some(json!({ "username": username, "version": version })),
                    );
                }
            }
            Ok(())
        }
    }
}
