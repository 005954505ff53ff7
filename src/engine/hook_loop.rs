// src/engine/hook_loop.rs

//! Background reconciliation task for one relationer.
//!
//! The task alternates between two suspension points: waiting for the next
//! membership batch (only when the queue is empty) and waiting for the hook
//! executor to accept the head of the queue. A `oneshot` stop signal is
//! observed at both.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::{RelhooksError, Result};
use crate::hook::{HookKind, HookSender};
use crate::relation::HookQueue;
use crate::scope::MembershipWatcher;
use crate::types::RelationId;

/// Handle for a running hook loop.
///
/// - `stop` requests that the loop exit at its next suspension point.
/// - `handle` is the Tokio task, awaited to confirm the loop is gone.
pub(crate) struct HookLoop {
    relation_id: RelationId,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl std::fmt::Debug for HookLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookLoop")
            .field("relation_id", &self.relation_id)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl HookLoop {
    /// Spawn the loop. `watcher` is `None` for a dying queue, which needs
    /// no further input.
    pub(crate) fn spawn(
        queue: HookQueue,
        watcher: Option<Box<dyn MembershipWatcher>>,
        hooks: HookSender,
    ) -> Self {
        let relation_id = queue.relation_id();
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let result = run_loop(queue, watcher, hooks, stop_rx).await;
            if let Err(err) = &result {
                error!(relation = relation_id, error = %err, "hook loop failed");
            }
            result
        });

        Self {
            relation_id,
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Signal the loop and wait for it to exit, returning its result.
    pub(crate) async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            if stop.send(()).is_err() {
                debug!(relation = self.relation_id, "hook loop already finished");
            }
        }

        match self.handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => Err(RelhooksError::Other(join_err.into())),
        }
    }
}

async fn run_loop(
    mut queue: HookQueue,
    mut watcher: Option<Box<dyn MembershipWatcher>>,
    hooks: HookSender,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    let relation_id = queue.relation_id();
    info!(relation = relation_id, dying = queue.is_dying(), "hook loop started");

    loop {
        if let Some(next) = queue.peek().cloned() {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                delivered = hooks.deliver(next.clone()) => {
                    delivered?;
                    queue.pop();
                    debug!(relation = relation_id, hook = %next, "hook delivered");
                    if next.kind == HookKind::Broken {
                        info!(relation = relation_id, "relation broken; hook stream closed");
                        return Ok(());
                    }
                }
            }
            continue;
        }

        let Some(w) = watcher.as_mut() else {
            // Dying queue fully drained; nothing can arrive any more.
            info!(relation = relation_id, "dying queue drained");
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = &mut stop => break,
            change = w.next() => match change {
                Some(Ok(change)) => {
                    debug!(relation = relation_id, ?change, "membership change");
                    queue.apply(change);
                }
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(RelhooksError::Watcher(format!(
                        "membership watcher for relation {relation_id} closed unexpectedly"
                    )));
                }
            },
        }
    }

    info!(relation = relation_id, "hook loop stopped");
    Ok(())
}
