// Settle Signal - chain advancement between consecutive units

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Resolves once the guarded unit has settled (success, failure or panic)
pub(super) struct Settled {
    rx: oneshot::Receiver<()>,
}

impl Settled {
    /// Wait for the guarded unit to finish
    ///
    /// A dropped `Advance` counts as settled, so this never blocks on a
    /// driver that no longer exists.
    pub(super) async fn wait(self) {
        let _ = self.rx.await;
    }
}

/// Held by the driver of a unit; settling or dropping it advances the chain
pub(super) struct Advance {
    tx: Option<oneshot::Sender<()>>,
    pending: Arc<AtomicUsize>,
}

impl Advance {
    /// Signal the next unit that this one is done
    pub(super) fn settle(self) {
        drop(self);
    }
}

impl Drop for Advance {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Create the advance/settled pair for one unit, counting it as pending
pub(super) fn settle_signal(pending: Arc<AtomicUsize>) -> (Advance, Settled) {
    pending.fetch_add(1, Ordering::AcqRel);
    let (tx, rx) = oneshot::channel();
    (
        Advance {
            tx: Some(tx),
            pending,
        },
        Settled { rx },
    )
}
