//! Follow-up work triggered by a successful panel configuration update.
//!
//! Two independent effects exist:
//! - keys outside [`RELOAD_EXEMPT_KEYS`] reload the panel service and drop the
//!   cached per-user `data.json` snapshots;
//! - `ssl`, `port` and `openpanel_proxy` rewrite the reverse proxy template.
//!
//! Neither effect is transactional with the primary update: failures are
//! reported and the already written configuration stays in place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{ConfigError, Result};
use crate::common::atomic_file::{FileLock, write_atomic};
use crate::common::config::CliConfig;
use crate::common::systemd::ServiceControl;

/// Keys whose update neither reloads the panel nor touches user snapshots
pub const RELOAD_EXEMPT_KEYS: [&str; 3] = ["autoupdate", "default_php_version", "autopatch"];

const SNAPSHOT_FILE: &str = "data.json";
const HTTP_PASS: &str = "proxy_pass http://";
const HTTPS_PASS: &str = "proxy_pass https://";
const OPENPANEL_LOCATION: &str = "location /openpanel";

pub fn requires_reload(key: &str) -> bool {
    !RELOAD_EXEMPT_KEYS.contains(&key)
}

/// A line-level rewrite of the reverse proxy template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRewrite {
    /// Switch `proxy_pass` upstreams to https (true) or http (false)
    Scheme { https: bool },
    Port(String),
    Location(String),
}

impl ProxyRewrite {
    /// The rewrite implied by setting `key` to `value`, if any
    pub fn for_update(key: &str, value: &str) -> Option<Self> {
        match (key, value) {
            ("ssl", "yes") => Some(ProxyRewrite::Scheme { https: true }),
            ("ssl", "no") => Some(ProxyRewrite::Scheme { https: false }),
            ("port", port) => Some(ProxyRewrite::Port(port.to_string())),
            ("openpanel_proxy", path) => Some(ProxyRewrite::Location(path.to_string())),
            _ => None,
        }
    }

    /// Rewrite a single line (without its terminator). `None` means untouched.
    pub fn rewrite_line(&self, line: &str) -> Option<String> {
        match self {
            ProxyRewrite::Scheme { https: true } if line.contains(HTTP_PASS) => {
                Some(line.replacen(HTTP_PASS, HTTPS_PASS, 1))
            }
            ProxyRewrite::Scheme { https: false } if line.contains(HTTPS_PASS) => {
                Some(line.replacen(HTTPS_PASS, HTTP_PASS, 1))
            }
            ProxyRewrite::Port(port) => rewrite_port(line, port),
            ProxyRewrite::Location(path) if line.contains(OPENPANEL_LOCATION) => {
                rewrite_location(line, path)
            }
            _ => None,
        }
    }

    /// Apply to a whole template; returns the new text and the number of
    /// lines that changed.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len() + 16);
        let mut changed = 0;
        for raw in text.split_inclusive('\n') {
            let body = raw
                .strip_suffix("\r\n")
                .or_else(|| raw.strip_suffix('\n'))
                .unwrap_or(raw);
            match self.rewrite_line(body) {
                Some(new) if new != body => {
                    out.push_str(&new);
                    out.push_str(&raw[body.len()..]);
                    changed += 1;
                }
                _ => out.push_str(raw),
            }
        }
        (out, changed)
    }
}

/// `proxy_pass http://host:8080/x;` -> `proxy_pass http://host:<port>/x;`
///
/// Only the port digits change; a host without a port gets one appended.
/// `[...]` is taken as a bracketed IPv6 host.
fn rewrite_port(line: &str, port: &str) -> Option<String> {
    let start = [line.find(HTTP_PASS), line.find(HTTPS_PASS)]
        .into_iter()
        .flatten()
        .min()?;
    let host_start = start + line[start..].find("://")? + 3;
    let rest = &line[host_start..];
    let host_len = if rest.starts_with('[') {
        rest.find(']')? + 1
    } else {
        rest.find(|c: char| c == ':' || c == ';' || c == '/' || c.is_whitespace())
            .unwrap_or(rest.len())
    };
    let host_end = host_start + host_len;

    let after_host = &line[host_end..];
    let tail = match after_host.strip_prefix(':') {
        Some(digits) => {
            let len = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            &digits[len..]
        }
        None => after_host,
    };
    Some(format!("{}:{}{}", &line[..host_end], port, tail))
}

/// Replace the path segment right after the first `/` of the line
fn rewrite_location(line: &str, path: &str) -> Option<String> {
    let seg_start = line.find('/')? + 1;
    let rest = &line[seg_start..];
    let seg_len = rest
        .find(|c: char| c == '/' || c == '{' || c == ';' || c.is_whitespace())
        .unwrap_or(rest.len());
    Some(format!(
        "{}{}{}",
        &line[..seg_start],
        path,
        &rest[seg_len..]
    ))
}

/// Rewrite the template at `path` under its lock; returns changed line count
pub fn rewrite_template(path: &Path, rewrite: &ProxyRewrite, lock_timeout: Duration) -> Result<usize> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let _lock = FileLock::acquire(path, lock_timeout)?;
    let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let (new_text, changed) = rewrite.apply(&text);
    if changed > 0 {
        write_atomic(path, &new_text)?;
    }
    Ok(changed)
}

/// Remove every `<users_dir>/*/data.json`; returns how many were removed
pub fn invalidate_user_snapshots(users_dir: &Path) -> Result<usize> {
    let pattern = format!(
        "{}/*/{}",
        glob::Pattern::escape(&users_dir.to_string_lossy()),
        SNAPSHOT_FILE
    );
    let paths = glob::glob(&pattern).map_err(|e| ConfigError::Other(e.into()))?;

    let mut removed = 0;
    for entry in paths {
        let path = entry.map_err(|e| ConfigError::Other(e.into()))?;
        fs::remove_file(&path).map_err(|e| ConfigError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}

/// What happened after an update, in the order it happened
#[derive(Debug)]
pub enum EffectOutcome {
    Reloaded { service: String },
    SnapshotsInvalidated(usize),
    ProxyRewritten { path: PathBuf, value: String, lines: usize },
    /// Non-fatal problem, e.g. the service could not be reloaded
    Warning { effect: &'static str, message: String },
    /// The effect failed; the primary update is kept
    Failed { effect: &'static str, error: ConfigError },
}

pub struct DerivedConfigEffects<'a> {
    proxy_template: PathBuf,
    users_dir: PathBuf,
    panel_service: String,
    reload_services: bool,
    lock_timeout: Duration,
    services: &'a dyn ServiceControl,
}

impl<'a> DerivedConfigEffects<'a> {
    pub fn new(config: &CliConfig, services: &'a dyn ServiceControl) -> Self {
        Self {
            proxy_template: config.proxy_template.clone(),
            users_dir: config.users_dir.clone(),
            panel_service: config.panel_service.clone(),
            reload_services: config.reload_services,
            lock_timeout: config.lock_timeout(),
            services,
        }
    }

    /// Run every effect owed for a committed `key=value` update
    pub fn after_update(&self, key: &str, value: &str) -> Vec<EffectOutcome> {
        let mut outcomes = Vec::new();

        if requires_reload(key) {
            if self.reload_services {
                match self.services.reload(&self.panel_service) {
                    Ok(()) => outcomes.push(EffectOutcome::Reloaded {
                        service: self.panel_service.clone(),
                    }),
                    Err(e) => outcomes.push(EffectOutcome::Warning {
                        effect: "reload",
                        message: format!("{:#}", e),
                    }),
                }
            }
            match invalidate_user_snapshots(&self.users_dir) {
                Ok(n) => outcomes.push(EffectOutcome::SnapshotsInvalidated(n)),
                Err(e) => outcomes.push(EffectOutcome::Warning {
                    effect: "snapshots",
                    message: e.to_string(),
                }),
            }
        }

        if let Some(rewrite) = ProxyRewrite::for_update(key, value) {
            match rewrite_template(&self.proxy_template, &rewrite, self.lock_timeout) {
                Ok(lines) => outcomes.push(EffectOutcome::ProxyRewritten {
                    path: self.proxy_template.clone(),
                    value: value.to_string(),
                    lines,
                }),
                Err(error) => outcomes.push(EffectOutcome::Failed {
                    effect: "proxy",
                    error,
                }),
            }
        }

        outcomes
    }
}
