// src/exec/backend.rs

//! Pluggable hook executor abstraction.
//!
//! The scenario runtime talks to a `HookExecutor` instead of running
//! anything itself, which makes it easy to swap in a fake in tests.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::errors::Result;
use crate::hook::HookInfo;
use crate::types::UnitName;

/// Everything a hook needs to run, captured after `prepare_hook`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRun {
    /// Full hook name, e.g. `db-relation-joined`.
    pub name: String,
    pub info: HookInfo,
    /// Remote units visible to the hook, in name order.
    pub members: Vec<UnitName>,
}

/// Trait abstracting how prepared hooks are executed.
pub trait HookExecutor: Send {
    /// Run one hook to completion.
    ///
    /// Returning an error aborts the run before the hook is committed, so it
    /// will be offered again on the next start.
    fn run_hook(&mut self, run: HookRun) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Executor that only reports hooks.
#[derive(Debug, Default)]
pub struct LoggingExecutor;

impl LoggingExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl HookExecutor for LoggingExecutor {
    fn run_hook(&mut self, run: HookRun) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            info!(hook = %run.name, unit = %run.info.remote_unit, "running hook");

            if run.info.remote_unit.is_empty() {
                println!("[hook] {}", run.name);
            } else {
                println!(
                    "[hook] {} {} (version {}) members={:?}",
                    run.name, run.info.remote_unit, run.info.change_version, run.members
                );
            }
            Ok(())
        })
    }
}
