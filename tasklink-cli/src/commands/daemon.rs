//! `tasklink daemon`: background sync lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use tasklink_core::System;
use tasklink_daemon::{start_blocking, DaemonClient, DaemonError};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run daemon in foreground (interval timer + socket server).
    Start,
    /// Request graceful daemon shutdown over Unix socket.
    Stop,
    /// Query daemon runtime status over Unix socket.
    Status,
    /// Run one pass in the daemon now.
    Sync,
    /// Re-examine every task of one system, then run a pass.
    Force {
        /// `gemini` or `purecm`.
        system: System,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;
    let client = DaemonClient::new(&home);

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match client.stop() {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match client.status() {
            Ok(status) => print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                print_json(&serde_json::json!({
                    "running": false,
                    "socket": client.socket().display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync => {
            let summary = client.sync().context("daemon sync failed")?;
            print_json(&summary)?;
        }
        DaemonCommand::Force { system } => {
            let summary = client.force(system)
                .with_context(|| format!("daemon forced sync of {system} failed"))?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render daemon JSON")?
    );
    Ok(())
}
