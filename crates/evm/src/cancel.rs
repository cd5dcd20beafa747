// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use futures::future::select_all;
use std::{future::pending, sync::Arc, time::Duration};
use tokio::sync::watch;

/// Triggers the [`CancelSignal`]s derived from it.
#[derive(Clone, Debug)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            sources: vec![self.tx.subscribe()],
        }
    }
}

/// Cooperative cancellation threaded through every suspension point.
///
/// A signal fires when any of its sources has been cancelled. Dropping a [`Canceller`]
/// without calling `cancel` never fires its signals.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    sources: Vec<watch::Receiver<bool>>,
}

/// Create a linked canceller and signal.
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, _) = watch::channel(false);
    let canceller = Canceller { tx: Arc::new(tx) };
    let signal = canceller.signal();
    (canceller, signal)
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { sources: vec![] }
    }

    pub fn is_cancelled(&self) -> bool {
        self.sources.iter().any(|rx| *rx.borrow())
    }

    /// Resolves once any source is cancelled.
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            return pending().await;
        }

        let waits = self.sources.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // Canceller dropped without cancelling
                    pending::<()>().await;
                }
            })
        });

        select_all(waits).await;
    }

    /// Derive a signal that also fires when the returned canceller is triggered.
    /// Cancelling the child never affects `self`.
    pub fn child(&self) -> (Canceller, CancelSignal) {
        let (canceller, own) = cancel_pair();
        let mut sources = self.sources.clone();
        sources.extend(own.sources);
        (canceller, CancelSignal { sources })
    }

    /// Derive a signal that additionally fires after `timeout`. Must be called within a
    /// tokio runtime.
    pub fn with_deadline(&self, timeout: Duration) -> CancelSignal {
        let (canceller, signal) = self.child();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            canceller.cancel();
        });
        signal
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
