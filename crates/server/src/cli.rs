//! CLI argument parsing.

use clap::{CommandFactory, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "leasehold", version, about = "Distributed periodic tasks and cached HTTP controllers")]
pub struct Cli {
    /// Keep running when files under the application directory change.
    #[arg(long, global = true, env = "LEASEHOLD_NO_WATCH")]
    pub no_watch: bool,

    #[command(subcommand)]
    pub command: Option<Mode>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Mode {
    /// Serve the controllers over HTTP on HOST:PORT.
    Www,
    /// Run the scheduler loop, or a single task once when TASK is given.
    Cron {
        /// Task id to debug.
        task: Option<String>,
    },
    /// Create the directory skeleton with example files.
    Prepare,
}

pub fn print_usage() {
    let mut cmd = Cli::command();
    if cmd.print_help().is_err() {
        eprintln!("Usage: leasehold <www|cron [TASK]|prepare>");
    }
}
