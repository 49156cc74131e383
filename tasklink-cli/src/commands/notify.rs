//! `tasklink notify`: hand a submitted change to the daemon.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use tasklink_adapters::ChangeSubmission;
use tasklink_daemon::{DaemonClient, DaemonError};

use super::home_dir;

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// JSON change submission; reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
}

impl NotifyArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let raw = match self.file.as_deref() {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            _ => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("failed to read change from stdin")?;
                buffer
            }
        };
        let change: ChangeSubmission =
            serde_json::from_str(&raw).context("invalid change submission JSON")?;

        let report = match DaemonClient::new(&home).notify(change) {
            Ok(report) => report,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                bail!("daemon is not running; start it with `tasklink daemon start`")
            }
            Err(err) => return Err(err).context("failed to notify daemon"),
        };

        let attached = report["attached"].as_array().map_or(0, Vec::len);
        let unlinked = report["unlinked"].as_array().map_or(0, Vec::len);
        println!("✓ change attached to {attached} issue(s), {unlinked} task(s) without a peer");
        if let Some(errors) = report["errors"].as_array() {
            for error in errors {
                println!("  ✗ {}", error.as_str().unwrap_or_default());
            }
        }
        Ok(())
    }
}
