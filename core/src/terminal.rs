use std::io;
use std::io::Write as _;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crossterm::cursor;
use crossterm::execute;
use crossterm::style::Color;
use crossterm::style::Colors;
use crossterm::style::ResetColor;
use crossterm::style::SetColors;

/// The console surface the relay writes to. One command session writes
/// through exactly one of these at a time; the shared handle's mutex is
/// the session's critical section.
pub trait Terminal: Send {
    fn foreground(&self) -> Color;
    fn background(&self) -> Color;
    fn set_colors(&mut self, background: Color, foreground: Color) -> io::Result<()>;
    /// Write without a trailing line break.
    fn write(&mut self, text: &str) -> io::Result<()>;
    /// Write followed by a line break.
    fn write_line(&mut self, text: &str) -> io::Result<()>;
    fn cursor_column(&self) -> io::Result<u16>;
}

pub type SharedTerminal = Arc<Mutex<Box<dyn Terminal>>>;

pub fn shared(terminal: impl Terminal + 'static) -> SharedTerminal {
    Arc::new(Mutex::new(Box::new(terminal)))
}

pub fn lock(terminal: &SharedTerminal) -> std::sync::MutexGuard<'_, Box<dyn Terminal>> {
    terminal.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Crossterm-backed terminal. ANSI terminals cannot be queried for
/// their current colors, so the pair is shadow-tracked; `Color::Reset`
/// stands in for "whatever the terminal default is".
pub struct AnsiTerminal {
    background: Color,
    foreground: Color,
}

impl AnsiTerminal {
    pub fn new() -> Self {
        Self {
            background: Color::Reset,
            foreground: Color::Reset,
        }
    }
}

impl Default for AnsiTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for AnsiTerminal {
    fn foreground(&self) -> Color {
        self.foreground
    }

    fn background(&self) -> Color {
        self.background
    }

    fn set_colors(&mut self, background: Color, foreground: Color) -> io::Result<()> {
        let mut stdout = io::stdout();
        if background == Color::Reset && foreground == Color::Reset {
            execute!(stdout, ResetColor)?;
        } else {
            execute!(stdout, SetColors(Colors::new(foreground, background)))?;
        }
        self.background = background;
        self.foreground = foreground;
        Ok(())
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()
    }

    fn cursor_column(&self) -> io::Result<u16> {
        cursor::position().map(|(column, _row)| column)
    }
}
