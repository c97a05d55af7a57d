//! Colorized streaming relay for wrapped console commands.
//!
//! The crate wraps a line-oriented external program (the `tree`
//! directory lister) and re-renders its output with a cycling
//! background/foreground palette and randomized inter-line pacing,
//! while staying promptly cancellable from Ctrl-C. The thin
//! interactive host lives in the `rtree-cli` crate.

pub mod cancel;
pub mod commands;
pub mod error;
pub mod host;
pub mod pacing;
pub mod palette;
pub mod process;
pub mod relay;
pub mod terminal;
pub mod test_support;

pub use cancel::CancelCoordinator;
pub use commands::CommandEvent;
pub use commands::CommandHandler;
pub use commands::CommandRegistry;
pub use commands::HostContext;
pub use error::RelayError;
pub use host::HostLink;
pub use palette::ColorPair;
pub use process::CommandProcess;
pub use process::ProcessEvent;
pub use relay::RelayConfig;
pub use relay::RelaySession;
pub use terminal::AnsiTerminal;
pub use terminal::SharedTerminal;
pub use terminal::Terminal;
