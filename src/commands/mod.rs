//! CLI subcommand implementations

pub mod download;
pub mod providers;
