// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::hook::HookKind;
use crate::relation::ValidationError;

#[derive(Error, Debug)]
pub enum RelhooksError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid relation state in {path:?}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("failed to write \"{kind}\" hook info for \"{unit}\" on state directory: {source}")]
    StateWrite {
        kind: HookKind,
        unit: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Membership watcher error: {0}")]
    Watcher(String),

    #[error("Scope error: {0}")]
    Scope(String),

    #[error("hook receiver closed")]
    HandoffClosed,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RelhooksError>;
