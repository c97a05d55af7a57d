use async_trait::async_trait;
use tracing::warn;

use crate::commands::CommandHandler;
use crate::commands::HostContext;
use crate::error::RelayError;
use crate::process::CommandProcess;
use crate::relay::RelaySession;
use crate::terminal;

/// The external directory-listing program the relay wraps.
pub const TREE_PROGRAM: &str = "tree";

/// `rtree [ARGS…]` — runs `tree` and re-renders its output through the
/// colorized streaming relay.
pub struct RainbowTree;

#[async_trait]
impl CommandHandler for RainbowTree {
    fn name(&self) -> &'static str {
        "RainbowTree"
    }

    fn description(&self) -> &'static str {
        "Handles command RTREE, a rainbow themed TREE command with artificial lag."
    }

    fn commands(&self) -> &'static [&'static str] {
        &["rtree"]
    }

    fn accepts_arguments(&self) -> bool {
        true
    }

    async fn execute(&self, context: &HostContext, input: &str) -> Result<(), RelayError> {
        // Split the command word from any tree parameters.
        let rest = input
            .trim()
            .split_once(' ')
            .map(|(_, rest)| rest)
            .unwrap_or("");
        let args = shlex::split(rest)
            .unwrap_or_else(|| rest.split_whitespace().map(str::to_string).collect());

        context.link.begin();
        let process = match CommandProcess::spawn(TREE_PROGRAM, &args, context.link.clone()) {
            Ok(process) => process,
            Err(err) => {
                warn!("rtree: {err}");
                {
                    let mut term = terminal::lock(&context.terminal);
                    term.write_line(&err.to_string())
                        .map_err(RelayError::terminal)?;
                }
                context.link.finish();
                context.write_prompt();
                return Ok(());
            }
        };

        let session = RelaySession::new(
            process,
            context.terminal.clone(),
            context.link.clone(),
            context.relay.clone(),
        );
        session.coordinator().install((context.interrupts)());
        session.run().await?;

        context.write_prompt();
        context.link.finish();
        Ok(())
    }
}
