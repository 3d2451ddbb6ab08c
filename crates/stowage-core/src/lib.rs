//! stowage-core - Core library for stowage
//!
//! This crate provides the core functionality for stowage, including:
//! - Configuration file parsing and merging
//! - Package references, settings, options and profiles
//! - The file-based package cache and editable packages
//! - Dependency graph resolution
//! - Deployers: lookup, execution context, built-ins and scripts
//! - Relocatable build-integration generators
//! - The end-to-end install flow

pub mod cache;
pub mod config;
pub mod deploy;
pub mod error;
pub mod generators;
pub mod graph;
pub mod install;
pub mod recipe;
pub mod reference;
pub mod resolve;

pub use error::{Error, Result};
