//! `opencli admin`: the admin panel service, its accounts and its
//! notification settings.

pub mod commands;
pub mod status;

pub use commands::{AdminCommands, AdminContext, handle_admin_command};
