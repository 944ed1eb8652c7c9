use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Installed panel version, as recorded by the installer
pub fn installed_version(version_file: &Path) -> Result<String> {
    let raw = fs::read_to_string(version_file)
        .with_context(|| format!("Local version file {} not found", version_file.display()))?;
    let version = raw.trim();
    if version.is_empty() {
        anyhow::bail!("Local version file {} is empty", version_file.display());
    }
    Ok(version.to_string())
}
