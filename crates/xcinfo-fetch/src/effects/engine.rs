use std::sync::Arc;

use tokio::sync::watch;

use crate::data::{TransferRequest, TransferState};
use crate::error::Result;

/// A download backend observed only through its state channel.
///
/// Implementations publish through the [`StatePublisher`] returned by
/// [`transfer_channel`], which guarantees the terminal state is the last
/// one observers ever see.
pub trait TransferEngine: Send + Sync {
    /// Begin one transfer run. Must be called from within a tokio runtime.
    fn start(&self, request: TransferRequest) -> Result<TransferHandle>;
}

/// Create the state channel and cancellation pair for one transfer run.
///
/// The engine keeps the publisher and the cancel signal; the handle goes
/// back to whoever called [`TransferEngine::start`].
pub fn transfer_channel() -> (StatePublisher, CancelSignal, TransferHandle) {
    let (tx, rx) = watch::channel(TransferState::starting());
    let (canceller, signal) = Canceller::pair();
    (
        StatePublisher { tx },
        signal,
        TransferHandle {
            states: rx,
            canceller,
        },
    )
}

/// Write side of a transfer's state channel.
#[derive(Debug)]
pub struct StatePublisher {
    tx: watch::Sender<TransferState>,
}

impl StatePublisher {
    /// Publish `state` unless a terminal state was already published.
    ///
    /// Returns whether the state was accepted.
    pub fn publish(&self, state: TransferState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = state;
            true
        })
    }
}

/// Read side of one transfer run.
#[derive(Debug)]
pub struct TransferHandle {
    states:    watch::Receiver<TransferState>,
    canceller: Canceller,
}

impl TransferHandle {
    pub fn canceller(&self) -> Canceller { self.canceller.clone() }

    pub fn states(&self) -> watch::Receiver<TransferState> { self.states.clone() }

    pub fn into_parts(self) -> (watch::Receiver<TransferState>, Canceller) {
        (self.states, self.canceller)
    }
}

/// Caller side of a cancellation flag. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn pair() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CancelSignal { rx })
    }

    pub fn cancel(&self) { self.tx.send_replace(true); }

    pub fn is_cancelled(&self) -> bool { *self.tx.borrow() }

    /// Clear the flag so the next run starts uncancelled.
    pub fn reset(&self) { self.tx.send_replace(false); }

    pub fn subscribe(&self) -> CancelSignal { CancelSignal { rx: self.tx.subscribe() } }
}

/// Engine side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Resolves once cancellation is requested; never resolves if every
    /// [`Canceller`] is dropped first.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }
}
