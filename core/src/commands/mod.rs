use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex_lite::Regex;
use tracing::warn;

use crate::error::RelayError;
use crate::host::HostLink;
use crate::relay::RelayConfig;
use crate::terminal;
use crate::terminal::SharedTerminal;
use crate::terminal::Terminal;

mod rainbow_tree;
mod rickroll;
mod trees;

pub use rainbow_tree::RainbowTree;
pub use rickroll::Rickroll;
pub use trees::Trees;

/// The command-match signal handed to handlers by the host's dispatch
/// loop.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    pub input: String,
    /// The enclosing mode suppresses command handling when set.
    pub edit_mode: bool,
    pub handled: bool,
}

impl CommandEvent {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            edit_mode: false,
            handled: false,
        }
    }
}

pub type PromptFn = Arc<dyn Fn(&mut dyn Terminal) -> io::Result<()> + Send + Sync>;
pub type InterruptSource = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Everything the host lends a handler for one invocation: the shared
/// console, the command-running flag convention, the prompt redraw
/// hook, and a factory for interrupt futures.
#[derive(Clone)]
pub struct HostContext {
    pub terminal: SharedTerminal,
    pub link: HostLink,
    pub prompt: PromptFn,
    pub interrupts: InterruptSource,
    pub relay: RelayConfig,
}

impl HostContext {
    /// Redraw the host prompt. Prompt failures are logged, not fatal.
    pub fn write_prompt(&self) {
        let mut term = terminal::lock(&self.terminal);
        if let Err(err) = (self.prompt)(&mut **term) {
            warn!("prompt redraw failed: {err}");
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Command words handled, lowercase.
    fn commands(&self) -> &'static [&'static str];
    /// Whether `command <anything>` should match too.
    fn accepts_arguments(&self) -> bool {
        false
    }
    async fn execute(&self, context: &HostContext, input: &str) -> Result<(), RelayError>;
}

struct Registration {
    handler: Arc<dyn CommandHandler>,
    matcher: OnceLock<Option<Regex>>,
}

impl Registration {
    /// Built lazily on first dispatch, so a handler registered without
    /// one gets the minimal initialization filled in on demand.
    fn matcher(&self) -> &Option<Regex> {
        self.matcher.get_or_init(|| {
            let commands = self.handler.commands();
            if commands.is_empty() {
                return None;
            }
            let tail = if self.handler.accepts_arguments() {
                "( .*)?"
            } else {
                ""
            };
            let pattern = format!("(?i)^({}){tail}$", commands.join("|"));
            match Regex::new(&pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!("bad command pattern for {}: {err}", self.handler.name());
                    None
                }
            }
        })
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    registrations: Vec<Registration>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.registrations.push(Registration {
            handler,
            matcher: OnceLock::new(),
        });
    }

    /// Walk the registrations in order; the first match claims the
    /// event. Returns whether anyone handled it.
    pub async fn dispatch(
        &self,
        event: &mut CommandEvent,
        context: &HostContext,
    ) -> Result<bool, RelayError> {
        if event.handled || event.edit_mode {
            return Ok(false);
        }
        let input = event.input.trim().to_string();
        for registration in &self.registrations {
            if let Some(regex) = registration.matcher()
                && regex.is_match(&input)
            {
                event.handled = true;
                registration.handler.execute(context, &input).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
