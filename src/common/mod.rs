pub mod atomic_file;
pub mod config;
pub mod network;
pub mod systemd;
