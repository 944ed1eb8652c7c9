use anyhow::{Context, Result};
use std::process::{Command, ExitStatus, Stdio};

/// Service supervision as needed by the admin and config commands
pub trait ServiceControl {
    /// Check if a service is currently active
    fn is_active(&self, service_name: &str) -> bool;

    /// Enable a service and start it immediately
    fn enable_now(&self, service_name: &str) -> Result<()>;

    /// Disable a service and stop it immediately
    fn disable_now(&self, service_name: &str) -> Result<()>;

    /// Ask a running service to reload its configuration
    fn reload(&self, service_name: &str) -> Result<()>;
}

/// Command executor function type, swapped out in tests
pub type CommandExecutor = Box<dyn Fn(&str, &[&str]) -> Result<ExitStatus> + Send + Sync>;

/// `systemctl`-backed service manager for system services
pub struct SystemdManager {
    command_executor: Option<CommandExecutor>,
}

impl SystemdManager {
    pub fn system() -> Self {
        Self {
            command_executor: None,
        }
    }

    /// Create a manager that routes every systemctl call through `executor`
    #[cfg(test)]
    pub fn new_with_executor(executor: CommandExecutor) -> Self {
        Self {
            command_executor: Some(executor),
        }
    }

    fn checked(&self, args: &[&str], what: &str, service_name: &str) -> Result<()> {
        let status = self
            .run_systemctl(args)
            .with_context(|| format!("Failed to {} service '{}'", what, service_name))?;

        if !status.success() {
            anyhow::bail!(
                "Failed to {} service '{}' (systemctl exited with {})",
                what,
                service_name,
                status
            );
        }
        Ok(())
    }

    fn run_systemctl(&self, args: &[&str]) -> Result<ExitStatus> {
        if let Some(ref executor) = self.command_executor {
            return executor("systemctl", args);
        }

        Command::new("systemctl")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run systemctl with args: {:?}", args))
    }
}

impl ServiceControl for SystemdManager {
    fn is_active(&self, service_name: &str) -> bool {
        self.run_systemctl(&["is-active", "--quiet", service_name])
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn enable_now(&self, service_name: &str) -> Result<()> {
        self.checked(&["enable", "--now", service_name], "enable", service_name)
    }

    fn disable_now(&self, service_name: &str) -> Result<()> {
        self.checked(&["disable", "--now", service_name], "disable", service_name)
    }

    fn reload(&self, service_name: &str) -> Result<()> {
        self.checked(&["reload", service_name], "reload", service_name)
    }
}
