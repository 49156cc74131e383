//! `tasklink sync`: one pass in-process, without the daemon.

use anyhow::{bail, Context, Result};
use clap::Args;

use tasklink_core::System;
use tasklink_sync::{pipeline, MonitorReport, PassSummary};

use super::home_dir;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Re-examine every Gemini task regardless of checkpoints.
    #[arg(long)]
    pub force_gemini: bool,

    /// Re-examine every PureCM task regardless of checkpoints.
    #[arg(long)]
    pub force_purecm: bool,

    /// Emit the pass summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let mut force = Vec::new();
        if self.force_gemini {
            force.push(System::Gemini);
        }
        if self.force_purecm {
            force.push(System::PureCm);
        }

        let summary = pipeline::run_once(&home, &force)
            .context("sync failed — run `tasklink init` and check the endpoints")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize pass JSON")?
            );
        } else {
            print_summary(&summary);
        }

        if !summary.is_clean() {
            bail!("{} system check(s) aborted", summary.failures.len());
        }
        Ok(())
    }
}

fn print_summary(summary: &PassSummary) {
    for (system, report) in &summary.reports {
        println!("✓ {system}: {}", describe(report));
    }
    for failure in &summary.failures {
        println!("✗ {}: check aborted — {}", failure.system, failure.error);
    }
}

fn describe(report: &MonitorReport) -> String {
    let mut line = format!(
        "{} projects, {} tasks seen ({} created, {} updated, {} unchanged, {} failed)",
        report.projects_scanned,
        report.tasks_seen,
        report.created,
        report.updated,
        report.unchanged,
        report.failed,
    );
    if report.forced {
        line.push_str(" [full]");
    }
    line
}
