use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use super::document::{ConfigDocument, LineKind};
use super::error::{ConfigError, Result};
use crate::common::network::PublicIpResolver;

const DEFAULT_SECTION: &str = "DEFAULT";

/// Reads the `[DEFAULT]` section of the panel configuration.
///
/// Lines before the first header count as DEFAULT. Collection stops at the
/// first header that is not `[DEFAULT]`; nothing after it is read, even a
/// second `[DEFAULT]`.
#[derive(Debug, Clone)]
pub struct SectionedConfigReader {
    path: PathBuf,
}

impl SectionedConfigReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_default_section(&self) -> Result<BTreeMap<String, String>> {
        let text = fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        Ok(default_section(&ConfigDocument::parse(&text)))
    }

    pub fn ssl_enabled(&self) -> Result<bool> {
        let section = self.read_default_section()?;
        Ok(section
            .get("ssl")
            .is_some_and(|v| v.eq_ignore_ascii_case("yes")))
    }

    /// `force_domain` when set, otherwise whatever the resolver reports
    pub fn public_hostname(&self, resolver: &dyn PublicIpResolver) -> anyhow::Result<String> {
        let section = self.read_default_section()?;
        match section.get("force_domain") {
            Some(domain) if !domain.is_empty() => Ok(domain.clone()),
            _ => resolver.public_ip(),
        }
    }
}

pub fn default_section(doc: &ConfigDocument) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in doc.lines() {
        match line.kind() {
            LineKind::Section(name) if name == DEFAULT_SECTION => continue,
            LineKind::Section(_) => break,
            LineKind::Entry { key, value } => {
                values.insert(key.trim().to_string(), value.clone());
            }
            _ => {}
        }
    }
    values
}
