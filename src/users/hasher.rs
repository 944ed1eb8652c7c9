use argon2::Argon2;
use argon2::password_hash::{PasswordHasher as _, SaltString, rand_core::OsRng};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::process::Command;

use super::error::{DirectoryError, Result};
use crate::common::config::{CliConfig, PasswordScheme};

const RANDOM_PASSWORD_LEN: usize = 12;

/// Turns a plaintext password into the opaque digest stored in the directory
pub trait PasswordHasher {
    fn hash(&self, password: &str) -> Result<String>;
}

/// Argon2id with the crate's default parameters
#[derive(Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| DirectoryError::Hashing(e.to_string()))
    }
}

/// Runs the panel's hashing helper with the password as last argument and
/// takes the hash from its stdout, so the AdminPanel login can verify it.
pub struct CommandHasher {
    program: String,
    args: Vec<String>,
}

impl CommandHasher {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DirectoryError::Hashing("hash_command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl PasswordHasher for CommandHasher {
    fn hash(&self, password: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(password)
            .output()
            .map_err(|e| DirectoryError::Hashing(format!("running {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DirectoryError::Hashing(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(DirectoryError::Hashing(format!(
                "{} printed no hash",
                self.program
            )));
        }
        Ok(hash)
    }
}

/// The hasher selected by `password_scheme`
pub fn from_config(config: &CliConfig) -> Result<Box<dyn PasswordHasher>> {
    match config.password_scheme {
        PasswordScheme::Helper => Ok(Box::new(CommandHasher::new(&config.hash_command)?)),
        PasswordScheme::Argon2 => Ok(Box::new(Argon2Hasher)),
    }
}

pub fn generate_random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_hash_is_salted_phc_string() {
        let hasher = Argon2Hasher;
        let a = hasher.hash("secret").unwrap();
        let b = hasher.hash("secret").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(!a.contains("secret"));
    }

    #[test]
    fn command_hasher_uses_helper_stdout() {
        let hasher = CommandHasher::new(&["echo".to_string(), "hashed:".to_string()]).unwrap();
        assert_eq!(hasher.hash("pw").unwrap(), "hashed: pw");
    }

    #[test]
    fn failing_helper_is_a_hashing_error() {
        let hasher = CommandHasher::new(&["false".to_string()]).unwrap();
        assert!(matches!(hasher.hash("pw"), Err(DirectoryError::Hashing(_))));
        assert!(CommandHasher::new(&[]).is_err());
    }

    #[test]
    fn default_config_hashes_through_the_panel_helper() {
        let config = CliConfig {
            hash_command: vec!["echo".to_string(), "panel-hash".to_string()],
            ..CliConfig::default()
        };
        let hash = from_config(&config).unwrap().hash("pw").unwrap();
        assert_eq!(hash, "panel-hash pw");

        let argon = CliConfig {
            password_scheme: PasswordScheme::Argon2,
            ..CliConfig::default()
        };
        assert!(from_config(&argon).unwrap().hash("pw").unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn random_passwords_are_alphanumeric() {
        let pw = generate_random_password();
        assert_eq!(pw.len(), 12);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
