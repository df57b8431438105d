//! CLI commands

pub mod init;
pub mod kinds;
pub mod nodes;
pub mod status;
pub mod sync;
