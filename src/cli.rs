//! CLI argument parsing for the dutycycle-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dutycycle-worker", about = "HOS trip-planning service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Run pending database migrations and exit
    Migrate,
}
