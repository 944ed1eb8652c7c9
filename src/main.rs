mod admin;
mod common;
mod kvconfig;
mod php;
mod ui;
mod update_check;
mod users;
mod version;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::admin::{AdminCommands, AdminContext};
use crate::common::config::CliConfig;
use crate::common::network::HttpIpResolver;
use crate::common::systemd::SystemdManager;
use crate::kvconfig::{ConfigError, KeyValueCommands};
use crate::php::PhpCommands;
use crate::ui::prelude::*;
use crate::update_check::HttpVersionSource;
use crate::users::DirectoryError;

/// OpenPanel administration CLI
#[derive(Parser, Debug)]
#[command(name = "opencli", author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to an alternative opencli.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read or change panel configuration parameters
    Config {
        #[command(subcommand)]
        command: KeyValueCommands,
    },
    /// Admin panel service, accounts and notifications
    Admin {
        #[command(subcommand)]
        command: Option<AdminCommands>,
    },
    /// PHP settings of hosting users
    Php {
        #[command(subcommand)]
        command: PhpCommands,
    },
    /// Print the installed panel version
    Version,
    /// Compare the installed version with the latest release
    UpdateCheck,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let services = SystemdManager::system();

    match &cli.command {
        Commands::Config { command } => {
            kvconfig::commands::handle_config_command(command, &config, &services)
        }
        Commands::Admin { command } => {
            let resolver = HttpIpResolver::new(config.public_ip_url.clone(), config.store_timeout());
            let ctx = AdminContext {
                config: &config,
                services: &services,
                resolver: &resolver,
            };
            admin::handle_admin_command(command.as_ref(), &ctx)
        }
        Commands::Php { command } => php::handle_php_command(command, &config),
        Commands::Version => {
            let version = version::installed_version(&config.version_file)?;
            emit(
                Level::Info,
                "opencli.version",
                &version,
                Some(serde_json::json!({ "version": version })),
            );
            Ok(())
        }
        Commands::UpdateCheck => {
            let source = HttpVersionSource::new(config.update_url.clone(), config.store_timeout());
            update_check::run_update_check(&config, &source)
        }
    }
}

fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        e.code()
    } else if let Some(e) = err.downcast_ref::<DirectoryError>() {
        e.code()
    } else {
        "opencli.error"
    }
}

fn main() {
    let cli = Cli::parse();

    ui::set_debug_mode(cli.debug);
    ui::init(cli.output, !cli.no_color);

    if let Err(e) = run(&cli) {
        emit(Level::Error, error_code(&e), &format!("{:#}", e), None);
        std::process::exit(1);
    }
}
