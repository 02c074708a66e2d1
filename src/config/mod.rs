// src/config/mod.rs

//! Configuration loading and validation for devloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into an immutable [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    load_and_validate, load_from_path, load_or_default, write_default_config,
    DEFAULT_CONFIG_TEMPLATE,
};
pub use model::{
    BuildSection, ConfigFile, LivereloadSection, RawConfigFile, RunSection, WatchSection,
};
