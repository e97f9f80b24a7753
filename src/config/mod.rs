// src/config/mod.rs

//! Configuration loading and validation for buildrig.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task shapes, references, cycles and watch bindings
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str, project_root};
pub use model::{
    ConfigFile, ConfigSection, RawConfigFile, TaskConfig, TaskRefConfig, TaskShape, WatchConfig,
};
