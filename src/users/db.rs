use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

use super::error::{DirectoryError, Result};
use super::models::{Account, AccountSummary, Role, validate_username};

/// The admin account store.
///
/// Every mutation runs in a `BEGIN IMMEDIATE` transaction: SQLite grants a
/// single writer at a time, so the existence, uniqueness and role checks and
/// the write that depends on them cannot interleave with another invocation.
/// Waiting for the writer lock is bounded by the busy timeout; on timeout the
/// transaction never started and nothing changed.
pub struct UserDirectory {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i32 = 1;

impl UserDirectory {
    /// Open an existing store
    pub fn open(path: &Path, timeout: Duration) -> Result<Self> {
        if !path.is_file() {
            return Err(DirectoryError::StoreMissing(path.to_path_buf()));
        }
        Self::with_connection(Connection::open(path)?, timeout)
    }

    /// Open the store, creating the database file if needed
    pub fn open_or_create(path: &Path, timeout: Duration) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, timeout)
    }

    fn with_connection(mut conn: Connection, timeout: Duration) -> Result<Self> {
        conn.busy_timeout(timeout)?;
        Self::init_schema(&mut conn)?;
        Ok(UserDirectory { conn })
    }

    fn init_schema(conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL,
                updated TEXT NOT NULL,
                PRIMARY KEY (version)
            )",
            (),
        )?;

        let version: i32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        if version < CURRENT_SCHEMA_VERSION {
            Self::migrate_schema(&tx, version)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn migrate_schema(tx: &Transaction<'_>, from_version: i32) -> Result<()> {
        if from_version < 1 {
            // Same layout the admin panel itself creates, so an existing
            // database is adopted as-is.
            tx.execute(
                "CREATE TABLE IF NOT EXISTS user (
                    id INTEGER PRIMARY KEY,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    is_active BOOLEAN DEFAULT 1 NOT NULL
                )",
                (),
            )?;
            tx.execute(
                "INSERT INTO schema_version (version, updated) VALUES (1, datetime('now'))",
                [],
            )?;
        }
        Ok(())
    }

    fn write_tx(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn exists(&self, username: &str) -> Result<bool> {
        Ok(role_of(&self.conn, username)?.is_some())
    }

    pub fn is_admin(&self, username: &str) -> Result<bool> {
        Ok(role_of(&self.conn, username)? == Some(Role::Admin))
    }

    #[cfg(test)]
    pub fn get(&self, username: &str) -> Result<Option<Account>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, password_hash, role, is_active FROM user WHERE username = ?1",
                [username],
                account_from_row,
            )
            .optional()?)
    }

    #[cfg(test)]
    pub fn create(&mut self, username: &str, password_hash: &str) -> Result<()> {
        self.create_with_role(username, password_hash, Role::User)
    }

    pub fn create_with_role(&mut self, username: &str, password_hash: &str, role: Role) -> Result<()> {
        if !validate_username(username) {
            return Err(DirectoryError::InvalidUsername(username.to_string()));
        }
        let tx = self.write_tx()?;
        if role_of(&tx, username)?.is_some() {
            return Err(DirectoryError::AlreadyExists(username.to_string()));
        }
        tx.execute(
            "INSERT INTO user (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![username, password_hash, role],
        )
        .map_err(|e| unique_to_exists(e, username))?;
        tx.commit()?;
        Ok(())
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if !validate_username(new) {
            return Err(DirectoryError::InvalidUsername(new.to_string()));
        }
        let tx = self.write_tx()?;
        if role_of(&tx, old)?.is_none() {
            return Err(DirectoryError::NotFound(old.to_string()));
        }
        if role_of(&tx, new)?.is_some() {
            return Err(DirectoryError::AlreadyExists(new.to_string()));
        }
        tx.execute(
            "UPDATE user SET username = ?1 WHERE username = ?2",
            params![new, old],
        )
        .map_err(|e| unique_to_exists(e, new))?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_password(&mut self, username: &str, password_hash: &str) -> Result<()> {
        let tx = self.write_tx()?;
        let changed = tx.execute(
            "UPDATE user SET password_hash = ?1 WHERE username = ?2",
            params![password_hash, username],
        )?;
        if changed == 0 {
            return Err(DirectoryError::NotFound(username.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    /// Deactivating an admin is refused inside the same transaction as the write
    pub fn set_active(&mut self, username: &str, active: bool) -> Result<()> {
        let tx = self.write_tx()?;
        match role_of(&tx, username)? {
            None => return Err(DirectoryError::NotFound(username.to_string())),
            Some(Role::Admin) if !active => {
                return Err(DirectoryError::Forbidden {
                    username: username.to_string(),
                    action: "suspend",
                });
            }
            Some(_) => {}
        }
        tx.execute(
            "UPDATE user SET is_active = ?1 WHERE username = ?2",
            params![active, username],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete(&mut self, username: &str) -> Result<()> {
        let tx = self.write_tx()?;
        match role_of(&tx, username)? {
            None => return Err(DirectoryError::NotFound(username.to_string())),
            Some(Role::Admin) => {
                return Err(DirectoryError::Forbidden {
                    username: username.to_string(),
                    action: "delete",
                });
            }
            Some(Role::User) => {}
        }
        tx.execute("DELETE FROM user WHERE username = ?1", [username])?;
        tx.commit()?;
        Ok(())
    }

    /// All accounts in insertion order
    pub fn list(&self) -> Result<Vec<AccountSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, password_hash, role, is_active FROM user ORDER BY id",
        )?;
        let rows = stmt.query_map([], account_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.summary());
        }
        Ok(result)
    }
}

fn role_of(conn: &Connection, username: &str) -> Result<Option<Role>> {
    Ok(conn
        .query_row(
            "SELECT role FROM user WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?)
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
        is_active: row.get(4)?,
    })
}

fn unique_to_exists(err: rusqlite::Error, username: &str) -> DirectoryError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DirectoryError::AlreadyExists(username.to_string())
        }
        other => DirectoryError::Store(other),
    }
}
