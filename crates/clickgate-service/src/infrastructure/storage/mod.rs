//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML file from `--config` or the
//! platform config directory, falls back to defaults when it is missing,
//! and can write a config back to disk.

pub mod config;
