use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("User '{0}' does not exist.")]
    NotFound(String),

    #[error("Username '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Cannot {action} user '{username}' with 'admin' role.")]
    Forbidden {
        username: String,
        action: &'static str,
    },

    #[error("Invalid username '{0}'")]
    InvalidUsername(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("User database {} does not exist.", .0.display())]
    StoreMissing(PathBuf),

    #[error("User store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl DirectoryError {
    /// Stable event code used when reporting the error
    pub fn code(&self) -> &'static str {
        match self {
            DirectoryError::NotFound(_) => "user.not_found",
            DirectoryError::AlreadyExists(_) => "user.already_exists",
            DirectoryError::Forbidden { .. } => "user.forbidden",
            DirectoryError::InvalidUsername(_) => "user.invalid",
            DirectoryError::Hashing(_) => "user.hashing",
            DirectoryError::StoreMissing(_) | DirectoryError::Store(_) => "user.store",
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
