use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::RelayError;
use crate::host::HostLink;

/// Lifecycle notifications raised by a running [`CommandProcess`].
///
/// `NewOutput` carries the number of queued lines at the time it was
/// raised; consumers still dequeue exactly one line per notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Started(bool),
    NewOutput(usize),
    Completed(bool),
}

pub(crate) type LineQueue = Arc<StdMutex<VecDeque<String>>>;

fn lock_queue(queue: &LineQueue) -> std::sync::MutexGuard<'_, VecDeque<String>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kill handle that stays valid after the process handle itself has
/// been torn down. Killing an already-exited (or already-collected)
/// child is a no-op.
#[derive(Clone, Debug)]
pub struct ProcessKiller {
    child: Arc<StdMutex<Option<Child>>>,
}

impl ProcessKiller {
    pub fn kill(&self) {
        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = slot.as_mut()
            && let Err(err) = child.start_kill()
        {
            debug!("kill request ignored: {err}");
        }
    }
}

/// A running external program producing an ordered, lazily consumed
/// sequence of output lines.
///
/// A reader task splits the child's stdout and stderr into lines,
/// appends them to the output queue in emission order, and raises one
/// `NewOutput` per line. When the child exits (normally or not) the
/// task clears the host's command-running flag and raises `Completed`.
#[derive(Debug)]
pub struct CommandProcess {
    output: LineQueue,
    events: Option<mpsc::UnboundedReceiver<ProcessEvent>>,
    child: Arc<StdMutex<Option<Child>>>,
    reader: Option<JoinHandle<()>>,
}

impl CommandProcess {
    pub fn spawn(program: &str, args: &[String], link: HostLink) -> Result<Self, RelayError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command
            .spawn()
            .map_err(|error| RelayError::spawn(program, error))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Arc::new(StdMutex::new(Some(child)));
        let output: LineQueue = Arc::new(StdMutex::new(VecDeque::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let child_slot = Arc::clone(&child);
        let queue = Arc::clone(&output);
        let reader = tokio::spawn(async move {
            let _ = events_tx.send(ProcessEvent::Started(true));
            let stderr_pump = stderr.map(|stream| {
                tokio::spawn(pump_lines(stream, Arc::clone(&queue), events_tx.clone()))
            });
            if let Some(stream) = stdout {
                pump_lines(stream, Arc::clone(&queue), events_tx.clone()).await;
            }
            if let Some(pump) = stderr_pump {
                let _ = pump.await;
            }
            let exited = {
                let taken = child_slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match taken {
                    Some(mut child) => match child.wait().await {
                        Ok(status) => status.success(),
                        Err(err) => {
                            debug!("failed to collect child exit status: {err}");
                            false
                        }
                    },
                    None => false,
                }
            };
            link.finish();
            let _ = events_tx.send(ProcessEvent::Completed(exited));
        });

        Ok(Self {
            output,
            events: Some(events_rx),
            child,
            reader: Some(reader),
        })
    }

    /// Subscribe to lifecycle events. The subscription can be taken
    /// once; later calls return `None`. Unsubscribing is dropping the
    /// receiver, which is naturally idempotent.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ProcessEvent>> {
        self.events.take()
    }

    /// Destructively dequeue the oldest not-yet-displayed line.
    pub fn dequeue_line(&self) -> Option<String> {
        lock_queue(&self.output).pop_front()
    }

    /// Lines currently queued and not yet displayed.
    pub fn queued_lines(&self) -> usize {
        lock_queue(&self.output).len()
    }

    pub fn killer(&self) -> ProcessKiller {
        ProcessKiller {
            child: Arc::clone(&self.child),
        }
    }

    /// Request forced termination. Safe to call at any point, including
    /// after the process has already exited.
    pub fn stop(&self) {
        self.killer().kill();
    }

    /// Block until the reader task (and therefore the child) is done.
    /// Idempotent; the second join is a no-op.
    pub async fn wait(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }

    /// Assemble a process handle from pre-wired parts. Used by the
    /// scripted feed in [`crate::test_support`].
    pub(crate) fn from_parts(
        output: LineQueue,
        events: mpsc::UnboundedReceiver<ProcessEvent>,
    ) -> Self {
        Self {
            output,
            events: Some(events),
            child: Arc::new(StdMutex::new(None)),
            reader: None,
        }
    }
}

async fn pump_lines<R>(stream: R, queue: LineQueue, events: mpsc::UnboundedSender<ProcessEvent>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                // The wrapped program picks its own encoding; anything
                // that is not valid UTF-8 passes through lossily.
                let line = String::from_utf8_lossy(&buf).into_owned();
                let ready = {
                    let mut lines = lock_queue(&queue);
                    lines.push_back(line);
                    lines.len()
                };
                let _ = events.send(ProcessEvent::NewOutput(ready));
            }
            Err(err) => {
                debug!("output stream closed with error: {err}");
                break;
            }
        }
    }
}
