use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(FromSqlError::Other(
                format!("unknown role '{}'", other).into(),
            )),
        }
    }
}

/// A row of `admin list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub role: Role,
    pub is_active: bool,
}

impl fmt::Display for AccountSummary {
    /// `('alice', 'user', 1)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "('{}', '{}', {})",
            self.username,
            self.role,
            u8::from(self.is_active)
        )
    }
}

/// A full account row; the hash never leaves the users module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

impl Account {
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            username: self.username.clone(),
            role: self.role,
            is_active: self.is_active,
        }
    }
}

/// Usernames are free-form but must be usable as a single CLI argument
pub fn validate_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && !username.chars().any(|c| c.is_whitespace() || c.is_control())
}
