//! Command implementations for the CLI.

mod watch;

pub use watch::{WatchArgs, cmd_watch};
