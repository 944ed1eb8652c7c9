use super::db::UserDirectory;
use super::error::{DirectoryError, Result};
use super::hasher::PasswordHasher;
use super::models::{AccountSummary, Role};
use crate::ui::SEPARATOR;

/// Account state changes, with the policy checks that precede them.
///
/// `Created -> Active <-> Suspended -> Deleted`; admins can be neither
/// suspended nor deleted.
pub struct UserLifecycle<'a> {
    directory: UserDirectory,
    hasher: &'a dyn PasswordHasher,
}

/// A completed password reset, kept around so the new password can be shown
/// to the operator once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub username: String,
    pub password: String,
}

impl PasswordReset {
    /// The delimited block handed to the operator. The plaintext password
    /// appears in it exactly once.
    pub fn render(&self, status_line: Option<&str>) -> String {
        let rule = SEPARATOR.repeat(63);
        let mut out = String::new();
        out.push('\n');
        out.push_str(&rule);
        out.push_str("\n\n");
        if let Some(status) = status_line {
            out.push_str(status);
            out.push_str("\n\n");
        }
        out.push_str(&format!("- username: {}\n", self.username));
        out.push_str(&format!("- password: {}\n", self.password));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
        out
    }
}

impl<'a> UserLifecycle<'a> {
    pub fn new(directory: UserDirectory, hasher: &'a dyn PasswordHasher) -> Self {
        Self { directory, hasher }
    }

    #[cfg(test)]
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn new_user(&mut self, username: &str, password: &str, role: Role) -> Result<()> {
        if self.directory.exists(username)? {
            return Err(DirectoryError::AlreadyExists(username.to_string()));
        }
        let hash = self.hasher.hash(password)?;
        self.directory.create_with_role(username, &hash, role)
    }

    pub fn suspend(&mut self, username: &str) -> Result<()> {
        self.ensure_not_admin(username, "suspend")?;
        self.directory.set_active(username, false)
    }

    pub fn unsuspend(&mut self, username: &str) -> Result<()> {
        self.directory.set_active(username, true)
    }

    pub fn delete(&mut self, username: &str) -> Result<()> {
        self.ensure_not_admin(username, "delete")?;
        self.directory.delete(username)
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        self.directory.rename(old, new)
    }

    pub fn reset_password(&mut self, username: &str, new_password: &str) -> Result<PasswordReset> {
        if !self.directory.exists(username)? {
            return Err(DirectoryError::NotFound(username.to_string()));
        }
        let hash = self.hasher.hash(new_password)?;
        self.directory.set_password(username, &hash)?;
        Ok(PasswordReset {
            username: username.to_string(),
            password: new_password.to_string(),
        })
    }

    pub fn list(&self) -> Result<Vec<AccountSummary>> {
        self.directory.list()
    }

    fn ensure_not_admin(&self, username: &str, action: &'static str) -> Result<()> {
        if self.directory.is_admin(username)? {
            return Err(DirectoryError::Forbidden {
                username: username.to_string(),
                action,
            });
        }
        Ok(())
    }
}
