use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::host::HostLink;
use crate::process::ProcessKiller;

/// Bridges the external interrupt signal to cooperative session
/// shutdown.
///
/// On trigger, in order: raise the level-triggered stop flag, cancel
/// the token (waking any in-flight pacing sleep), request termination
/// of the external process, and clear the host's command-running flag
/// so the enclosing prompt loop resumes. The coordinator never exits
/// the process itself, and triggering after teardown is a guarded
/// no-op.
#[derive(Clone, Debug)]
pub struct CancelCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Debug)]
struct CoordinatorInner {
    token: CancellationToken,
    stopped: AtomicBool,
    killer: StdMutex<Option<ProcessKiller>>,
    watcher: StdMutex<Option<JoinHandle<()>>>,
    link: HostLink,
}

impl CancelCoordinator {
    pub fn new(link: HostLink) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                token: CancellationToken::new(),
                stopped: AtomicBool::new(false),
                killer: StdMutex::new(None),
                watcher: StdMutex::new(None),
                link,
            }),
        }
    }

    /// The token pacing sleeps select against.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Level-triggered stop flag; once true it stays true for the
    /// session's remaining lifetime.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Attach the process handle the trigger path should terminate.
    pub(crate) fn bind(&self, killer: ProcessKiller) {
        let mut slot = self
            .inner
            .killer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(killer);
    }

    /// Install the interrupt watcher for the duration of the session.
    /// Installing while a watcher is already active is a no-op.
    pub fn install<F>(&self, interrupt: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        let coordinator = self.clone();
        *slot = Some(tokio::spawn(async move {
            interrupt.await;
            coordinator.trigger();
        }));
    }

    /// Detach the interrupt watcher. Double-removal is safe.
    pub fn remove(&self) {
        let taken = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = taken {
            watcher.abort();
        }
    }

    /// Run the shutdown sequence. Every step is idempotent, so a late
    /// or duplicate signal cannot fault.
    pub fn trigger(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("interrupt after stop; ignoring");
        }
        self.inner.token.cancel();
        let killer = self
            .inner
            .killer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(killer) = killer {
            killer.kill();
        }
        // Propagate intent to the host loop through the pre-existing
        // command-running flag convention.
        self.inner.link.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn trigger_sets_flag_cancels_token_and_clears_link() {
        let link = HostLink::new();
        link.begin();
        let coordinator = CancelCoordinator::new(link.clone());
        assert!(!coordinator.is_stopped());

        coordinator.trigger();

        assert!(coordinator.is_stopped());
        assert!(coordinator.token().is_cancelled());
        assert!(!link.is_running());
    }

    #[tokio::test]
    async fn trigger_twice_matches_trigger_once() {
        let coordinator = CancelCoordinator::new(HostLink::new());
        coordinator.trigger();
        coordinator.trigger();
        assert!(coordinator.is_stopped());
        assert!(coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn watcher_fires_trigger_on_interrupt() {
        let coordinator = CancelCoordinator::new(HostLink::new());
        let interrupt = Arc::new(Notify::new());
        let armed = Arc::clone(&interrupt);
        coordinator.install(async move { armed.notified().await });

        interrupt.notify_one();
        // Let the watcher task run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(coordinator.is_stopped());
    }

    #[tokio::test]
    async fn double_install_and_double_remove_are_safe() {
        let coordinator = CancelCoordinator::new(HostLink::new());
        coordinator.install(std::future::pending());
        coordinator.install(std::future::pending());
        coordinator.remove();
        coordinator.remove();
        assert!(!coordinator.is_stopped());
    }

    #[tokio::test]
    async fn removed_watcher_no_longer_triggers() {
        let coordinator = CancelCoordinator::new(HostLink::new());
        let interrupt = Arc::new(Notify::new());
        let armed = Arc::clone(&interrupt);
        coordinator.install(async move { armed.notified().await });
        coordinator.remove();

        interrupt.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!coordinator.is_stopped());
    }
}
