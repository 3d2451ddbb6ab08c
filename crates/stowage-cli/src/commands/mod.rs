//! Subcommand implementations

pub mod cache;
pub mod editable;
pub mod install;
