// src/config/mod.rs

//! Scenario configuration for relhooks.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate relation ids, unit names and steps (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{parse_duration, ConfigFile, ConfigSection, RelationConfig, Step};
pub use validate::validate_config;
