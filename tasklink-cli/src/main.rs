//! tasklink: keeps Gemini issues and PureCM tasks in step.
//!
//! # Usage
//!
//! ```text
//! tasklink init [--gemini-url <url>] [--purecm-url <url>] [--interval <secs>]
//! tasklink sync [--force-gemini] [--force-purecm]
//! tasklink status [--json]
//! tasklink notify [<change.json>]
//! tasklink daemon start|stop|status|sync|force <system>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, init::InitArgs, notify::NotifyArgs, status::StatusArgs,
    sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tasklink",
    version,
    about = "Bidirectional sync between the Gemini tracker and the PureCM task ledger",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default ~/.tasklink/config.yaml.
    Init(InitArgs),

    /// Run one sync pass in-process.
    Sync(SyncArgs),

    /// Show link counts and checkpoints from the identity store.
    Status(StatusArgs),

    /// Forward a submitted change to the running daemon.
    Notify(NotifyArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Notify(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
