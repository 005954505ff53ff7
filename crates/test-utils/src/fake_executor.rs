use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use relhooks::errors::{RelhooksError, Result};
use relhooks::exec::{HookExecutor, HookRun};

/// A fake executor that:
/// - records every hook it was asked to run
/// - optionally fails the hook with a given name, leaving it uncommitted.
#[derive(Debug, Default, Clone)]
pub struct RecordingExecutor {
    executed: Arc<Mutex<Vec<HookRun>>>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first hook whose name equals `hook_name`.
    pub fn failing_on(hook_name: &str) -> Self {
        Self {
            executed: Arc::default(),
            fail_on: Some(hook_name.to_string()),
        }
    }

    /// Shared list of runs, usable after the executor moved into a runtime.
    pub fn executed(&self) -> Arc<Mutex<Vec<HookRun>>> {
        Arc::clone(&self.executed)
    }
}

impl HookExecutor for RecordingExecutor {
    fn run_hook(&mut self, run: HookRun) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_on.as_deref() == Some(run.name.as_str()) {
                self.fail_on = None;
                return Err(RelhooksError::Other(anyhow::anyhow!(
                    "hook {} failed",
                    run.name
                )));
            }
            self.executed.lock().unwrap().push(run);
            Ok(())
        })
    }
}
