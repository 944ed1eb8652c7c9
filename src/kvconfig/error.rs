use std::path::PathBuf;
use thiserror::Error;

const DOCS_URL: &str = "https://openpanel.co/docs/admin/scripts/openpanel_config";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Parameter {key} does not exist in {}. Docs: {}", .path.display(), DOCS_URL)]
    KeyNotFound { key: String, path: PathBuf },

    #[error("Invalid parameter name '{0}'")]
    InvalidKey(String),

    #[error("Value for '{0}' must be a single line")]
    InvalidValue(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Rejected {
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path)
        } else {
            ConfigError::Io { path, source }
        }
    }

    /// Stable event code used when reporting the error
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound(_) => "config.file_not_found",
            ConfigError::KeyNotFound { .. } => "config.key_not_found",
            ConfigError::InvalidKey(_)
            | ConfigError::InvalidValue(_)
            | ConfigError::Rejected { .. } => "config.invalid",
            ConfigError::Io { .. } | ConfigError::Other(_) => "config.io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
