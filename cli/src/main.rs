use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rtree_core::AnsiTerminal;
use rtree_core::CommandEvent;
use rtree_core::CommandRegistry;
use rtree_core::HostContext;
use rtree_core::HostLink;
use rtree_core::RelayConfig;
use rtree_core::Terminal;
use rtree_core::commands::RainbowTree;
use rtree_core::commands::Rickroll;
use rtree_core::commands::Trees;
use rtree_core::relay::DEFAULT_SETTLE_LIMIT;
use rtree_core::terminal;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Interactive prompt that wraps the TREE command in a rainbow relay.
#[derive(Debug, Parser)]
#[command(name = "rtree", version)]
struct Cli {
    /// Color rotation period in milliseconds.
    #[arg(long, default_value_t = 3_000)]
    rotation_ms: u64,

    /// Disable the randomized inter-line delays.
    #[arg(long)]
    no_pacing: bool,
}

fn write_prompt(term: &mut dyn Terminal) -> io::Result<()> {
    let cwd = std::env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "?".to_string());
    term.write(&format!("{cwd}> "))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(RainbowTree));
    registry.register(Arc::new(Trees));
    registry.register(Arc::new(Rickroll));

    let context = HostContext {
        terminal: terminal::shared(AnsiTerminal::new()),
        link: HostLink::new(),
        prompt: Arc::new(write_prompt),
        interrupts: Arc::new(|| {
            Box::pin(async {
                let _ = tokio::signal::ctrl_c().await;
            })
        }),
        relay: RelayConfig {
            rotation_period: Duration::from_millis(cli.rotation_ms),
            pacing: !cli.no_pacing,
            settle_limit: DEFAULT_SETTLE_LIMIT,
        },
    };

    context.write_prompt();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let trimmed = line.trim().to_string();
                if trimmed.is_empty() {
                    context.write_prompt();
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") {
                    break;
                }
                let mut event = CommandEvent::new(line);
                match registry.dispatch(&mut event, &context).await {
                    // Handlers redraw the prompt themselves.
                    Ok(true) => {}
                    Ok(false) => {
                        let mut term = terminal::lock(&context.terminal);
                        term.write_line(&format!(
                            "'{trimmed}' is not recognized as a command handled by this shell."
                        ))?;
                        drop(term);
                        context.write_prompt();
                    }
                    Err(err) => {
                        error!("command failed: {err}");
                        context.write_prompt();
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                // ^C at an idle prompt: fresh line, fresh prompt.
                {
                    let mut term = terminal::lock(&context.terminal);
                    term.write_line("")?;
                }
                context.write_prompt();
            }
        }
    }
    Ok(())
}
