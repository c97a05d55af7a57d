use async_trait::async_trait;
use crossterm::style::Color;

use crate::commands::CommandHandler;
use crate::commands::HostContext;
use crate::error::RelayError;
use crate::terminal;

const TREE_ASCII_ART: &str = r"      /\          /\          /\
     /  \        /  \        /  \
    / /\ \      / /\ \      / /\ \
   / /  \ \    / /  \ \    / /  \ \
  / / /\ \ \  / / /\ \ \  / / /\ \ \
 /_/_/__\_\_\/_/_/__\_\_\/_/_/__\_\_\
      ||          ||          ||
      ||          ||          ||";

/// `trees` — prints a fixed block of ASCII-art trees in green.
pub struct Trees;

#[async_trait]
impl CommandHandler for Trees {
    fn name(&self) -> &'static str {
        "Trees"
    }

    fn description(&self) -> &'static str {
        "Handles TREES command - prints some ASCII art trees."
    }

    fn commands(&self) -> &'static [&'static str] {
        &["trees"]
    }

    fn accepts_arguments(&self) -> bool {
        true
    }

    async fn execute(&self, context: &HostContext, _input: &str) -> Result<(), RelayError> {
        {
            let mut term = terminal::lock(&context.terminal);
            let background = term.background();
            let foreground = term.foreground();
            term.set_colors(background, Color::Green)
                .map_err(RelayError::terminal)?;
            term.write_line(&format!("\n\n{TREE_ASCII_ART}\n"))
                .map_err(RelayError::terminal)?;
            term.set_colors(background, foreground)
                .map_err(RelayError::terminal)?;
        }
        context.write_prompt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTerminal;
    use crate::test_support::TerminalOp;
    use crate::test_support::test_context;

    #[tokio::test]
    async fn prints_green_art_and_restores_foreground() {
        let recording = RecordingTerminal::new();
        let context = test_context(&recording);
        Trees.execute(&context, "trees").await.expect("execute");

        let ops = recording.ops();
        assert!(matches!(
            ops.first(),
            Some(TerminalOp::SetColors(Color::Reset, Color::Green))
        ));
        assert!(
            ops.iter()
                .any(|op| matches!(op, TerminalOp::WriteLine(text) if text.contains("/\\")))
        );
        // Foreground back to where it started, prompt redrawn last.
        assert_eq!(recording.colors(), (Color::Reset, Color::Reset));
        assert!(matches!(
            ops.last(),
            Some(TerminalOp::Write(text)) if text == "> "
        ));
    }
}
