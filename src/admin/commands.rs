use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

use super::status;
use crate::common::config::CliConfig;
use crate::common::network::PublicIpResolver;
use crate::common::systemd::ServiceControl;
use crate::kvconfig::commands::{KeyValueCommands, print_value, update_value};
use crate::kvconfig::KeyValueConfigStore;
use crate::ui::prelude::*;
use crate::users::hasher::{self, generate_random_password};
use crate::users::{Role, UserDirectory, UserLifecycle};

/// Password argument that asks for a generated password
const RANDOM_PASSWORD: &str = "random";

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Enable and start the admin panel service
    On,
    /// Stop and disable the admin panel service
    Off,
    /// Reset the password of an admin panel user
    Password {
        username: String,
        /// New password, or "random" to generate one
        password: String,
    },
    /// Rename an admin panel user
    Rename { old: String, new: String },
    /// List admin panel users as (username, role, is_active)
    List,
    /// Create a new admin panel user
    New {
        username: String,
        password: String,
        /// Role of the new account
        #[arg(long, value_enum, default_value_t = Role::User)]
        role: Role,
    },
    /// Suspend a user (not allowed for admins)
    Suspend { username: String },
    /// Reactivate a suspended user
    Unsuspend { username: String },
    /// Delete a user (not allowed for admins)
    Delete { username: String },
    /// Read or change notification thresholds
    Notifications {
        #[command(subcommand)]
        command: KeyValueCommands,
    },
}

/// Collaborators the admin commands reach outside this process through
pub struct AdminContext<'a> {
    pub config: &'a CliConfig,
    pub services: &'a dyn ServiceControl,
    pub resolver: &'a dyn PublicIpResolver,
}

pub fn handle_admin_command(command: Option<&AdminCommands>, ctx: &AdminContext<'_>) -> Result<()> {
    let Some(command) = command else {
        return status::print_status(ctx.config, ctx.services, ctx.resolver);
    };

    match command {
        AdminCommands::On => {
            emit(Level::Info, "admin.enabling", "Enabling the AdminPanel...", None);
            ctx.services.enable_now(&ctx.config.admin_service)?;
            status::print_status(ctx.config, ctx.services, ctx.resolver)
        }
        AdminCommands::Off => {
            emit(Level::Info, "admin.disabling", "Disabling the AdminPanel...", None);
            ctx.services.disable_now(&ctx.config.admin_service)?;
            status::print_status(ctx.config, ctx.services, ctx.resolver)
        }
        AdminCommands::Notifications { command } => {
            let store = KeyValueConfigStore::new(
                &ctx.config.notifications_config,
                ctx.config.lock_timeout(),
            );
            match command {
                KeyValueCommands::Get { key } => print_value(&store, key),
                KeyValueCommands::Update { key, value } => update_value(&store, key, value),
            }
        }
        AdminCommands::New { username, password, role } => {
            let hasher = hasher::from_config(ctx.config)?;
            let directory =
                UserDirectory::open_or_create(&ctx.config.users_db, ctx.config.store_timeout())?;
            let mut lifecycle = UserLifecycle::new(directory, hasher.as_ref());
            lifecycle.new_user(username, password, *role)?;
            emit(
                Level::Success,
                "user.created",
                &format!("User '{}' created.", username),
                Some(json!({ "username": username, "role": role })),
            );
            Ok(())
        }
        AdminCommands::Password { username, password } => reset_password(ctx, username, password),
        AdminCommands::Rename { old, new } => {
            with_lifecycle(ctx, |lc| lc.rename(old, new))?;
            emit(
                Level::Success,
                "user.renamed",
                &format!("User '{}' renamed to '{}'.", old, new),
                Some(json!({ "old": old, "new": new })),
            );
            Ok(())
        }
        AdminCommands::Suspend { username } => {
            with_lifecycle(ctx, |lc| lc.suspend(username))?;
            user_event("user.suspended", username, "suspended");
            Ok(())
        }
        AdminCommands::Unsuspend { username } => {
            with_lifecycle(ctx, |lc| lc.unsuspend(username))?;
            user_event("user.unsuspended", username, "unsuspended");
            Ok(())
        }
        AdminCommands::Delete { username } => {
            with_lifecycle(ctx, |lc| lc.delete(username))?;
            user_event("user.deleted", username, "deleted");
            Ok(())
        }
        AdminCommands::List => {
            let accounts = with_lifecycle(ctx, |lc| lc.list())?;
            for account in accounts {
                emit(
                    Level::Info,
                    "user.entry",
                    &account.to_string(),
                    serde_json::to_value(&account).ok(),
                );
            }
            Ok(())
        }
    }
}

fn with_lifecycle<T>(
    ctx: &AdminContext<'_>,
    op: impl FnOnce(&mut UserLifecycle<'_>) -> crate::users::error::Result<T>,
) -> Result<T> {
    let hasher = hasher::from_config(ctx.config)?;
    let directory = UserDirectory::open(&ctx.config.users_db, ctx.config.store_timeout())?;
    let mut lifecycle = UserLifecycle::new(directory, hasher.as_ref());
    Ok(op(&mut lifecycle)?)
}

fn user_event(code: &str, username: &str, verb: &str) {
    emit(
        Level::Success,
        code,
        &format!("User '{}' {} successfully.", username, verb),
        Some(json!({ "username": username })),
    );
}

fn reset_password(ctx: &AdminContext<'_>, username: &str, password: &str) -> Result<()> {
    let password = if password == RANDOM_PASSWORD {
        generate_random_password()
    } else {
        password.to_string()
    };

    let reset = with_lifecycle(ctx, |lc| lc.reset_password(username, &password))
        .with_context(|| format!("password not changed for user '{}'", username))?;

    // JSON consumers get the password in the event, text readers in the block
    emit(
        Level::Success,
        "user.password_changed",
        &format!("Password for user '{}' changed.", reset.username),
        Some(json!({ "username": reset.username, "password": reset.password })),
    );

    let status_line = match status::detect(ctx.config, ctx.services, ctx.resolver) {
        Ok(status) => Some(status.message()),
        Err(e) => {
            emit(
                Level::Debug,
                "admin.status_unavailable",
                &format!("Could not determine AdminPanel status: {:#}", e),
                None,
            );
            None
        }
    };
    plain(&reset.render(status_line.as_deref()));
    Ok(())
}
