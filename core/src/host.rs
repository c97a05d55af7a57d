use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Notify;

/// The host's "command still running" convention.
///
/// The host raises the flag before dispatching a command; whichever
/// collaborator finishes the command (the external process exiting, or
/// the cancellation coordinator on Ctrl-C) clears it and notifies.
/// Because that propagation is asynchronous relative to the relay, the
/// relay waits on it with [`HostLink::settle`] rather than polling.
#[derive(Clone, Debug, Default)]
pub struct HostLink {
    running: Arc<AtomicBool>,
    done: Arc<Notify>,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a command as in flight.
    pub fn begin(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clear the flag and wake anyone settling on it. Idempotent.
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.done.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait briefly for the flag to clear, then proceed regardless.
    /// This is deliberately a bounded wait, not an indefinite one.
    pub async fn settle(&self, limit: Duration) {
        if !self.is_running() {
            return;
        }
        let _ = tokio::time::timeout(limit, self.done.notified()).await;
    }
}
