// src/hook/handoff.rs

//! Zero-buffer handoff of hooks from a producer loop to the hook executor.
//!
//! Tokio has no zero-capacity channel, so an offer travels through a
//! one-slot `mpsc` channel together with a `oneshot` acceptance sender. The
//! producer only treats a hook as delivered once the receiver has accepted
//! it, which keeps the producer at most one hook ahead of the consumer.
//!
//! If the producer stops waiting (its future is dropped, e.g. on
//! `stop_hooks`), the acceptance receiver goes away with it and the stale
//! offer is silently skipped by [`HookReceiver::recv`].

use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::errors::{RelhooksError, Result};
use crate::hook::HookInfo;

struct Offer {
    info: HookInfo,
    accepted: oneshot::Sender<()>,
}

/// Producer half. Cheap to clone; every background loop gets its own clone.
#[derive(Clone)]
pub struct HookSender {
    tx: mpsc::Sender<Offer>,
}

/// Consumer half, owned by the hook executor.
pub struct HookReceiver {
    rx: mpsc::Receiver<Offer>,
}

impl std::fmt::Debug for HookSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSender").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for HookReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookReceiver").finish_non_exhaustive()
    }
}

/// Create a connected sender/receiver pair.
pub fn handoff() -> (HookSender, HookReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (HookSender { tx }, HookReceiver { rx })
}

impl HookSender {
    /// Offer `info` and wait until the receiver has taken it.
    ///
    /// Cancel safe in the sense that matters here: if this future is dropped
    /// before acceptance, the hook is never observed by the receiver.
    pub async fn deliver(&self, info: HookInfo) -> Result<()> {
        let (accepted_tx, accepted_rx) = oneshot::channel();
        self.tx
            .send(Offer {
                info,
                accepted: accepted_tx,
            })
            .await
            .map_err(|_| RelhooksError::HandoffClosed)?;

        accepted_rx.await.map_err(|_| RelhooksError::HandoffClosed)
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl HookReceiver {
    /// Wait for the next hook.
    ///
    /// Returns `None` once every sender has been dropped.
    pub async fn recv(&mut self) -> Option<HookInfo> {
        while let Some(offer) = self.rx.recv().await {
            if let Some(info) = accept(offer) {
                return Some(info);
            }
        }
        None
    }

    /// Take a hook if one is being offered right now.
    pub fn try_recv(&mut self) -> Option<HookInfo> {
        while let Ok(offer) = self.rx.try_recv() {
            if let Some(info) = accept(offer) {
                return Some(info);
            }
        }
        None
    }
}

fn accept(offer: Offer) -> Option<HookInfo> {
    if offer.accepted.send(()).is_ok() {
        Some(offer.info)
    } else {
        trace!(hook = %offer.info, "discarding hook offer withdrawn by producer");
        None
    }
}
