//! Admin accounts: the SQLite-backed directory and the lifecycle operations
//! built on top of it.

pub mod db;
pub mod error;
pub mod hasher;
pub mod lifecycle;
pub mod models;

pub use db::UserDirectory;
pub use error::DirectoryError;
pub use lifecycle::UserLifecycle;
pub use models::Role;
