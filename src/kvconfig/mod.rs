//! `key=value` configuration files: the line model, the in-place store, the
//! `[DEFAULT]` section reader, and the effects of panel configuration updates.

pub mod commands;
pub mod document;
pub mod effects;
pub mod error;
pub mod sections;
pub mod store;

pub use commands::KeyValueCommands;
pub use error::ConfigError;
pub use sections::SectionedConfigReader;
pub use store::KeyValueConfigStore;
