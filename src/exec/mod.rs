// src/exec/mod.rs

//! Hook execution layer.
//!
//! The relationer only decides *which* hook runs next; actually running
//! workload code is the job of an [`HookExecutor`]. This crate ships a
//! [`LoggingExecutor`] that reports each hook on stdout, and tests plug in
//! their own recording implementation.

pub mod backend;

pub use backend::{HookExecutor, HookRun, LoggingExecutor};
