//! I/O helpers for studio commands.

pub mod backend;
pub mod config;
pub mod export;
pub mod init;
pub mod project;
pub mod prompt;
