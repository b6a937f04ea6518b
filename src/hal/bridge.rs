//! Turns callback-completed device operations into ordinary awaitable calls.
//!
//! A task arms a one-shot [`notification`], hands the [`Completion`] half to the
//! device together with the operation, and suspends on the [`Pending`] half.
//! The device finishes the operation from whatever context it likes (an
//! interrupt handler, a DMA callback, another thread) by calling
//! [`Completion::complete`], which only stores the result and wakes the task.

use super::Transfer;
use thiserror::Error;
use tokio::sync::oneshot;

/// Completion half of a task notification, owned by the device while an operation is in flight.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completion<T> {
    /// Store `value` and wake the waiting task.
    ///
    /// Never blocks and never allocates, so it may be called from interrupt context.
    /// Consuming `self` makes a second completion impossible.
    pub fn complete(self, value: T) {
        // The waiting task may have been aborted, there is nobody left to tell
        let _ = self.tx.send(value);
    }
}

/// Waiting half of a task notification.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// Suspend until the completion fires.
    /// Returns `None` if the completion was dropped without being invoked.
    pub async fn wait(self) -> Option<T> {
        self.rx.await.ok()
    }
}

/// Arm a fresh single-slot notification.
pub fn notification<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, Pending { rx })
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The device refused to start the transfer. The buffer is handed back.
    #[error("device could not start the transfer")]
    NotStarted(Vec<u8>),

    /// The device dropped the completion without invoking it.
    #[error("device abandoned the transfer")]
    Abandoned,
}

/// Start a buffer transfer with `start` and wait for the device to complete it.
///
/// `start` receives ownership of `buf` and must either return `Ok(())` after
/// scheduling the transfer, or hand the buffer back with `Err(buf)`.
pub async fn transfer<F>(buf: Vec<u8>, start: F) -> Result<Transfer, BridgeError>
where
    F: FnOnce(Vec<u8>, Completion<Transfer>) -> Result<(), Vec<u8>>,
{
    let (completion, pending) = notification();
    start(buf, completion).map_err(BridgeError::NotStarted)?;

    // Once started there is no way to cancel, commit to the completion
    pending.wait().await.ok_or(BridgeError::Abandoned)
}
