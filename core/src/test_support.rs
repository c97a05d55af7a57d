//! Deterministic collaborators for session-level tests: a scripted
//! process feed that stands in for a spawned child, and a terminal
//! that records every operation for later assertion.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;

use crossterm::style::Color;
use tokio::sync::mpsc;

use crate::commands::HostContext;
use crate::host::HostLink;
use crate::process::CommandProcess;
use crate::process::ProcessEvent;
use crate::relay::RelayConfig;
use crate::terminal;
use crate::terminal::Terminal;

/// A host context wired for deterministic tests: recording terminal,
/// far-future rotation timer, pacing off, interrupts that never fire.
pub fn test_context(recording: &RecordingTerminal) -> HostContext {
    let prompt: crate::commands::PromptFn = Arc::new(|term: &mut dyn Terminal| term.write("> "));
    let interrupts: crate::commands::InterruptSource =
        Arc::new(|| Box::pin(std::future::pending::<()>()));
    HostContext {
        terminal: terminal::shared(recording.clone()),
        link: HostLink::new(),
        prompt,
        interrupts,
        relay: RelayConfig {
            rotation_period: std::time::Duration::from_secs(3_600),
            pacing: false,
            settle_limit: std::time::Duration::from_millis(10),
        },
    }
}

/// A process handle whose lifecycle is driven by the test instead of a
/// real child. Events pushed here are consumed by the relay in order.
pub fn scripted_process(link: HostLink) -> (CommandProcess, ScriptedFeed) {
    let output = Arc::new(StdMutex::new(VecDeque::new()));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let process = CommandProcess::from_parts(Arc::clone(&output), events_rx);
    (
        process,
        ScriptedFeed {
            output,
            events: events_tx,
            link,
        },
    )
}

pub struct ScriptedFeed {
    output: Arc<StdMutex<VecDeque<String>>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    link: HostLink,
}

impl ScriptedFeed {
    pub fn start(&self) {
        let _ = self.events.send(ProcessEvent::Started(true));
    }

    pub fn push_line(&self, line: &str) {
        let ready = {
            let mut queue = self.output.lock().unwrap_or_else(PoisonError::into_inner);
            queue.push_back(line.to_string());
            queue.len()
        };
        let _ = self.events.send(ProcessEvent::NewOutput(ready));
    }

    /// Signal process exit the way the real reader task does: clear
    /// the host flag first, then raise `Completed`.
    pub fn complete(&self, success: bool) {
        self.link.finish();
        let _ = self.events.send(ProcessEvent::Completed(success));
    }

    pub fn queued_lines(&self) -> usize {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOp {
    /// (background, foreground)
    SetColors(Color, Color),
    Write(String),
    WriteLine(String),
}

#[derive(Debug)]
struct RecordingState {
    ops: Vec<TerminalOp>,
    background: Color,
    foreground: Color,
    column: u16,
}

/// Records every terminal operation in order. Cloning yields another
/// handle onto the same recording, so a test can keep one while the
/// session owns the other.
#[derive(Debug, Clone)]
pub struct RecordingTerminal {
    inner: Arc<StdMutex<RecordingState>>,
}

impl RecordingTerminal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StdMutex::new(RecordingState {
                ops: Vec::new(),
                background: Color::Reset,
                foreground: Color::Reset,
                column: 0,
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ops(&self) -> Vec<TerminalOp> {
        self.state().ops.clone()
    }

    pub fn colors(&self) -> (Color, Color) {
        let state = self.state();
        (state.background, state.foreground)
    }

    /// Completed visual lines, in display order. A line is everything
    /// written between two terminators.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for op in &self.state().ops {
            match op {
                TerminalOp::Write(text) => current.push_str(text),
                TerminalOp::WriteLine(text) => {
                    current.push_str(text);
                    lines.push(std::mem::take(&mut current));
                }
                TerminalOp::SetColors(..) => {}
            }
        }
        lines
    }

    /// Non-empty visual lines (the relay's blank separators dropped).
    pub fn text_lines(&self) -> Vec<String> {
        self.lines().into_iter().filter(|l| !l.is_empty()).collect()
    }

    pub fn color_changes(&self) -> usize {
        self.state()
            .ops
            .iter()
            .filter(|op| matches!(op, TerminalOp::SetColors(..)))
            .count()
    }
}

impl Default for RecordingTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for RecordingTerminal {
    fn foreground(&self) -> Color {
        self.state().foreground
    }

    fn background(&self) -> Color {
        self.state().background
    }

    fn set_colors(&mut self, background: Color, foreground: Color) -> io::Result<()> {
        let mut state = self.state();
        state.background = background;
        state.foreground = foreground;
        state.ops.push(TerminalOp::SetColors(background, foreground));
        Ok(())
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut state = self.state();
        state.column = state.column.saturating_add(text.len() as u16);
        state.ops.push(TerminalOp::Write(text.to_string()));
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let mut state = self.state();
        state.column = 0;
        state.ops.push(TerminalOp::WriteLine(text.to_string()));
        Ok(())
    }

    fn cursor_column(&self) -> io::Result<u16> {
        Ok(self.state().column)
    }
}
