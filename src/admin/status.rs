use anyhow::Result;
use colored::Colorize;

use crate::common::config::CliConfig;
use crate::common::network::PublicIpResolver;
use crate::common::systemd::ServiceControl;
use crate::kvconfig::SectionedConfigReader;
use crate::ui::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminStatus {
    Running { url: String },
    Stopped,
}

impl AdminStatus {
    pub fn message(&self) -> String {
        match self {
            AdminStatus::Running { url } => format!(
                "{} AdminPanel is running and is available on: {}",
                "●".green(),
                url
            ),
            AdminStatus::Stopped => format!(
                "{} AdminPanel is not running. To enable it run 'opencli admin on'",
                "×".red()
            ),
        }
    }
}

pub fn admin_url(ssl: bool, host: &str, port: u16) -> String {
    let scheme = if ssl { "https" } else { "http" };
    format!("{}://{}:{}/", scheme, host, port)
}

/// With SSL the panel is addressed by `force_domain` (or the public IP when
/// unset), without it always by the public IP.
pub fn detect(
    config: &CliConfig,
    services: &dyn ServiceControl,
    resolver: &dyn PublicIpResolver,
) -> Result<AdminStatus> {
    if !services.is_active(&config.admin_service) {
        return Ok(AdminStatus::Stopped);
    }

    let reader = SectionedConfigReader::new(&config.panel_config);
    let ssl = match reader.ssl_enabled() {
        Ok(ssl) => ssl,
        Err(e) => {
            emit(
                Level::Debug,
                "admin.ssl_unknown",
                &format!("Assuming SSL is off: {}", e),
                None,
            );
            false
        }
    };
    let host = if ssl {
        reader.public_hostname(resolver)?
    } else {
        resolver.public_ip()?
    };
    Ok(AdminStatus::Running {
        url: admin_url(ssl, &host, config.admin_port),
    })
}

pub fn print_status(
    config: &CliConfig,
    services: &dyn ServiceControl,
    resolver: &dyn PublicIpResolver,
) -> Result<()> {
    match detect(config, services, resolver)? {
        status @ AdminStatus::Running { .. } => emit(
            Level::Success,
            "admin.running",
            &status.message(),
            None,
        ),
        status @ AdminStatus::Stopped => {
            emit(Level::Warn, "admin.stopped", &status.message(), None)
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::network::StaticIpResolver;
    use std::fs;
    use tempfile::tempdir;

    struct Fixed(bool);

    impl ServiceControl for Fixed {
        fn is_active(&self, _: &str) -> bool {
            self.0
        }
        fn enable_now(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn disable_now(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn reload(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn config_with(panel: &str) -> (tempfile::TempDir, CliConfig) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.config");
        fs::write(&path, panel).unwrap();
        let config = CliConfig {
            panel_config: path,
            ..CliConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn url_formats() {
        assert_eq!(admin_url(true, "panel.example.com", 2087), "https://panel.example.com:2087/");
        assert_eq!(admin_url(false, "203.0.113.7", 2087), "http://203.0.113.7:2087/");
    }

    #[test]
    fn ssl_uses_forced_domain() {
        let (_dir, config) = config_with("[DEFAULT]\nssl=yes\nforce_domain=panel.example.com\n");
        let ip = StaticIpResolver("203.0.113.7".to_string());
        assert_eq!(
            detect(&config, &Fixed(true), &ip).unwrap(),
            AdminStatus::Running {
                url: "https://panel.example.com:2087/".to_string()
            }
        );
    }

    #[test]
    fn plain_http_uses_public_ip() {
        let (_dir, config) = config_with("[DEFAULT]\nssl=no\nforce_domain=panel.example.com\n");
        let ip = StaticIpResolver("203.0.113.7".to_string());
        assert_eq!(
            detect(&config, &Fixed(true), &ip).unwrap(),
            AdminStatus::Running {
                url: "http://203.0.113.7:2087/".to_string()
            }
        );
    }

    #[test]
    fn stopped_service_needs_no_lookup() {
        let (_dir, config) = config_with("");
        let ip = StaticIpResolver(String::new());
        assert_eq!(detect(&config, &Fixed(false), &ip).unwrap(), AdminStatus::Stopped);
    }
}
