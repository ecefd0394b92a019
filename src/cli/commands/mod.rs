//! Subcommand implementations.

pub mod assets;
pub mod browse;
pub mod folders;
