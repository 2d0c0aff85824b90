//! # modelgen-cli
//!
//! CLI library for generating Rust content models from a schema snapshot.
//!
//! This crate provides everything the `modelgen` binary needs around the
//! generator itself: configuration, file watching, drift detection and
//! logging setup.
//!
//! ## Architecture
//!
//! - [`config`] - Configuration management and TOML parsing
//! - [`watcher`] - File system watching for development mode
//! - [`validate`] - Comparison of generated files with a dry run
//! - [`logging`] - Subscriber setup
//! - [`error`] - Error types and handling

pub mod config;
pub mod error;
pub mod logging;
pub mod validate;
pub mod watcher;

// Re-export main types for convenience
pub use config::{CliArgs, Config, ConfigManager};
pub use error::{CliError, CliResult};
pub use validate::{validate, Drift, DriftKind, ValidationReport};
pub use watcher::{FileWatcher, WatchEvent};
