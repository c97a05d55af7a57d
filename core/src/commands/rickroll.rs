use async_trait::async_trait;
use tracing::warn;

use crate::commands::CommandHandler;
use crate::commands::HostContext;
use crate::error::RelayError;
use crate::terminal;

const RICKROLL_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// `rickroll` — opens a well-known YouTube video in the default
/// browser.
pub struct Rickroll;

#[async_trait]
impl CommandHandler for Rickroll {
    fn name(&self) -> &'static str {
        "Rickroll"
    }

    fn description(&self) -> &'static str {
        "Handles command RICKROLL - opens a YouTube video in default browser."
    }

    fn commands(&self) -> &'static [&'static str] {
        &["rickroll"]
    }

    async fn execute(&self, context: &HostContext, _input: &str) -> Result<(), RelayError> {
        {
            let mut term = terminal::lock(&context.terminal);
            term.write_line("").map_err(RelayError::terminal)?;
        }
        context.write_prompt();
        // Never gonna give an error to the caller over a browser.
        if let Err(err) = webbrowser::open(RICKROLL_URL) {
            warn!("could not open browser: {err}");
        }
        Ok(())
    }
}
