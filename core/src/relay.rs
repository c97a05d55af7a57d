use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crossterm::style::Color;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::CancelCoordinator;
use crate::error::RelayError;
use crate::host::HostLink;
use crate::pacing;
use crate::palette::ColorPair;
use crate::process::CommandProcess;
use crate::process::ProcessEvent;
use crate::terminal;
use crate::terminal::SharedTerminal;

/// Default color-rotation period. Do not set this too low: rotating
/// faster than lines are produced visibly thrashes the colors.
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_millis(3_000);

/// How long teardown waits for the host's command-running flag before
/// proceeding regardless.
pub const DEFAULT_SETTLE_LIMIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub rotation_period: Duration,
    /// Random inter-line delays; disable for byte-exact test runs.
    pub pacing: bool,
    pub settle_limit: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rotation_period: DEFAULT_ROTATION_PERIOD,
            pacing: true,
            settle_limit: DEFAULT_SETTLE_LIMIT,
        }
    }
}

/// One end-to-end execution of a wrapped external process plus its
/// colorized display.
///
/// The session owns the process handle, the cancellation coordinator,
/// the palette state, and the rotation timer, and tears all of them
/// down exactly once whichever way the session ends. Display happens
/// under the shared terminal's mutex so overlapping notifications can
/// never interleave writes; the interrupt path only flips atomic state
/// and therefore cannot tear a line either.
pub struct RelaySession {
    process: CommandProcess,
    terminal: SharedTerminal,
    coordinator: CancelCoordinator,
    link: HostLink,
    config: RelayConfig,
    palette: ColorPair,
    timer_armed: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

impl RelaySession {
    pub fn new(
        process: CommandProcess,
        terminal: SharedTerminal,
        link: HostLink,
        config: RelayConfig,
    ) -> Self {
        let coordinator = CancelCoordinator::new(link.clone());
        coordinator.bind(process.killer());
        Self {
            process,
            terminal,
            coordinator,
            link,
            config,
            palette: ColorPair::first(),
            timer_armed: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    /// Handle for wiring the interrupt signal (and for tests).
    pub fn coordinator(&self) -> CancelCoordinator {
        self.coordinator.clone()
    }

    /// The timer-armed flag. The rotation timer raises it once per
    /// period; the relay consumes it on the next displayed line.
    pub fn timer_armed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.timer_armed)
    }

    /// Drive the session to completion: relay output until the process
    /// completes or cancellation fires, then tear down in fixed order
    /// (unsubscribe, detach interrupt watcher, stop timer, restore the
    /// console). Teardown runs on every exit path.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let mut events = self
            .process
            .take_events()
            .ok_or(RelayError::AlreadySubscribed)?;
        let saved = {
            let term = terminal::lock(&self.terminal);
            (term.background(), term.foreground())
        };

        let active = self.relay_until_complete(&mut events).await;

        drop(events);
        self.coordinator.remove();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if active.is_err() {
            self.process.stop();
        }
        self.process.wait().await;
        self.link.settle(self.config.settle_limit).await;
        let restored = self.restore(saved);
        active.and(restored)
    }

    async fn relay_until_complete(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<ProcessEvent>,
    ) -> Result<(), RelayError> {
        {
            let mut term = terminal::lock(&self.terminal);
            term.set_colors(self.palette.background, self.palette.foreground)
                .map_err(RelayError::terminal)?;
            // Line break after the echoed command, already colorized.
            term.write_line("").map_err(RelayError::terminal)?;
        }
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Started(started) => {
                    if !started {
                        debug!("external process reported a failed start");
                    }
                    self.start_timer();
                }
                ProcessEvent::NewOutput(_) => self.relay_one().await?,
                ProcessEvent::Completed(success) => {
                    // Abnormal exit is ordinary completion to the relay.
                    if !success {
                        debug!("external process exited abnormally");
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Display exactly one queued line. Runs its display steps under
    /// the terminal mutex; the pacing sleep happens outside the lock
    /// and is preempted by cancellation.
    async fn relay_one(&mut self) -> Result<(), RelayError> {
        let pause = {
            let mut term = terminal::lock(&self.terminal);
            if self.coordinator.is_stopped() {
                // Swallow the notification; the queue is left as-is.
                return Ok(());
            }
            let Some(line) = self.process.dequeue_line() else {
                return Ok(());
            };
            term.write(&line).map_err(RelayError::terminal)?;
            if self.timer_armed.swap(false, Ordering::AcqRel) {
                self.palette = self.palette.next();
                term.set_colors(self.palette.background, self.palette.foreground)
                    .map_err(RelayError::terminal)?;
            }
            // The terminator comes after any color change so a
            // rotation never splits one visual line into two colors.
            term.write_line("").map_err(RelayError::terminal)?;

            if self.config.pacing {
                let mut rng = rand::rng();
                pacing::should_delay(&mut rng).then(|| pacing::delay(&mut rng))
            } else {
                None
            }
        };
        if let Some(limit) = pause {
            let token = self.coordinator.token();
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(limit) => {}
            }
        }
        Ok(())
    }

    fn start_timer(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let armed = Arc::clone(&self.timer_armed);
        let period = self.config.rotation_period;
        self.timer = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticks = tokio::time::interval_at(start, period);
            loop {
                ticks.tick().await;
                armed.store(true, Ordering::Release);
            }
        }));
    }

    fn restore(&self, saved: (Color, Color)) -> Result<(), RelayError> {
        let mut term = terminal::lock(&self.terminal);
        term.set_colors(saved.0, saved.1)
            .map_err(RelayError::terminal)?;
        term.write_line("").map_err(RelayError::terminal)?;
        // An echoed ^C can leave the cursor mid-line; clear it off.
        if term.cursor_column().unwrap_or(0) != 0 {
            term.write_line("").map_err(RelayError::terminal)?;
        }
        Ok(())
    }
}
