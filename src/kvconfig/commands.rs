use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use super::effects::{DerivedConfigEffects, EffectOutcome};
use super::store::KeyValueConfigStore;
use crate::common::config::CliConfig;
use crate::common::systemd::ServiceControl;
use crate::ui::prelude::*;

/// `get`/`update` on a flat `key=value` file
#[derive(Subcommand, Debug, Clone)]
pub enum KeyValueCommands {
    /// Print the value of a parameter
    Get {
        /// Parameter name
        key: String,
    },
    /// Change the value of an existing parameter
    Update {
        /// Parameter name
        key: String,
        /// New value
        value: String,
    },
}

/// `opencli config ...`: the panel configuration, with its follow-up effects
pub fn handle_config_command(
    command: &KeyValueCommands,
    config: &CliConfig,
    services: &dyn ServiceControl,
) -> Result<()> {
    let store = KeyValueConfigStore::new(&config.panel_config, config.lock_timeout());
    match command {
        KeyValueCommands::Get { key } => print_value(&store, key),
        KeyValueCommands::Update { key, value } => {
            update_value(&store, key, value)?;
            let effects = DerivedConfigEffects::new(config, services);
            report_effects(effects.after_update(key, value))
        }
    }
}

pub fn print_value(store: &KeyValueConfigStore, key: &str) -> Result<()> {
    let value = store.get(key)?;
    emit(
        Level::Info,
        "config.value",
        &value,
        Some(json!({ "key": key, "value": value, "file": store.path() })),
    );
    Ok(())
}

pub fn update_value(store: &KeyValueConfigStore, key: &str, value: &str) -> Result<()> {
    store.update(key, value)?;
    emit(
        Level::Success,
        "config.updated",
        &format!("Updated {} to {}", key, value),
        Some(json!({ "key": key, "value": value, "file": store.path() })),
    );
    Ok(())
}

fn report_effects(outcomes: Vec<EffectOutcome>) -> Result<()> {
    let mut failure = None;
    for outcome in outcomes {
        match outcome {
            EffectOutcome::Reloaded { service } => emit(
                Level::Info,
                "effect.reloaded",
                &format!("Reloaded service '{}'", service),
                None,
            ),
            EffectOutcome::SnapshotsInvalidated(count) => emit(
                Level::Debug,
                "effect.snapshots",
                &format!("Removed {} cached user snapshot(s)", count),
                Some(json!({ "removed": count })),
            ),
            EffectOutcome::ProxyRewritten { path, value, lines } => emit(
                Level::Info,
                "effect.proxy",
                &format!("Updated proxy configuration in {} to {}", path.display(), value),
                Some(json!({ "file": path, "lines": lines })),
            ),
            EffectOutcome::Warning { effect, message } => emit(
                Level::Warn,
                "effect.warning",
                &format!("{}: {}", effect, message),
                None,
            ),
            EffectOutcome::Failed { effect, error } => {
                emit(
                    Level::Debug,
                    "effect.failed",
                    &format!("{} effect failed", effect),
                    None,
                );
                failure = Some(error);
            }
        }
    }
    match failure {
        Some(error) => Err(anyhow::Error::new(error)
            .context("configuration updated, but the proxy template could not be rewritten")),
        None => Ok(()),
    }
}
