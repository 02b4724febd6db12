//! CLI subcommands.

pub mod common;
pub mod config;
pub mod fallback;
pub mod init;
pub mod run;
