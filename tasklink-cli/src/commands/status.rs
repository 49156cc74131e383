//! `tasklink status`: identity store and daemon visibility.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tasklink_core::{config, Checkpoint, EntityKind, Options, System};
use tasklink_daemon::DaemonClient;
use tasklink_sync::identity::{load_document, store_path_at};
use tasklink_sync::LinkDocument;

use super::home_dir;

const KINDS: [EntityKind; 4] = [
    EntityKind::Project,
    EntityKind::Version,
    EntityKind::User,
    EntityKind::Task,
];

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let options =
            config::load_at(&home).context("failed to load config — run `tasklink init` first")?;
        let store = store_path_at(&home);
        let document = load_document(&store)
            .with_context(|| format!("failed to read {}", store.display()))?;

        let report = build_report(&home, &options, &document);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    store: String,
    daemon_running: bool,
    systems: Vec<SystemStatus>,
}

#[derive(Debug, Serialize)]
struct SystemStatus {
    system: System,
    url: String,
    links: LinkCounts,
    /// Latest project checkpoint, RFC 3339.
    last_checkpoint: Option<String>,
    force_pending: bool,
}

#[derive(Debug, Default, Serialize)]
struct LinkCounts {
    project: usize,
    version: usize,
    user: usize,
    task: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "system")]
    system: String,
    #[tabled(rename = "projects")]
    projects: usize,
    #[tabled(rename = "versions")]
    versions: usize,
    #[tabled(rename = "users")]
    users: usize,
    #[tabled(rename = "tasks")]
    tasks: usize,
    #[tabled(rename = "last checkpoint")]
    last_checkpoint: String,
}

fn build_report(home: &Path, options: &Options, document: &LinkDocument) -> StatusReport {
    let systems = System::ALL
        .into_iter()
        .map(|system| {
            let mut links = LinkCounts::default();
            for kind in KINDS {
                let count = document.link_count(system, kind);
                match kind {
                    EntityKind::Project => links.project = count,
                    EntityKind::Version => links.version = count,
                    EntityKind::User => links.user = count,
                    EntityKind::Task => links.task = count,
                }
            }
            let last_checkpoint = document
                .checkpoints_of(system, EntityKind::Project)
                .into_iter()
                .map(|(_, checkpoint)| checkpoint)
                .filter(|checkpoint| !checkpoint.is_unset())
                .max()
                .map(|checkpoint: Checkpoint| checkpoint.to_datetime().to_rfc3339());
            let (url, force_pending) = match system {
                System::Gemini => (options.gemini.url.clone(), options.force_gemini_sync),
                System::PureCm => (options.purecm.url.clone(), options.force_purecm_sync),
            };
            SystemStatus {
                system,
                url,
                links,
                last_checkpoint,
                force_pending,
            }
        })
        .collect();

    StatusReport {
        store: store_path_at(home).display().to_string(),
        daemon_running: daemon_running(home),
        systems,
    }
}

/// One attempt, no retry, so a stopped daemon does not slow `status` down.
fn daemon_running(home: &Path) -> bool {
    DaemonClient::new(home).is_running()
}

fn print_table(report: &StatusReport) {
    let daemon = if report.daemon_running {
        "running".green().bold().to_string()
    } else {
        "stopped".bright_black().bold().to_string()
    };
    println!(
        "tasklink v{} | daemon {} | {}",
        env!("CARGO_PKG_VERSION"),
        daemon,
        report.store,
    );

    let rows: Vec<StatusTableRow> = report
        .systems
        .iter()
        .map(|status| StatusTableRow {
            system: status.system.to_string(),
            projects: status.links.project,
            versions: status.links.version,
            users: status.links.user,
            tasks: status.links.task,
            last_checkpoint: status
                .last_checkpoint
                .clone()
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for status in report.systems.iter().filter(|s| s.force_pending) {
        println!(
            "{} full sync of {} pending on the next pass",
            "■".yellow().bold(),
            status.system
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklink_core::NativeId;
    use tasklink_sync::{IdentityMap, MemoryIdentityMap};

    #[test]
    fn report_counts_links_per_system_and_latest_checkpoint() {
        let mut links = MemoryIdentityMap::new();
        links
            .set(System::PureCm, EntityKind::Task, NativeId(1001), NativeId(7))
            .expect("task link");
        links
            .set(System::PureCm, EntityKind::Project, NativeId(1002), NativeId(3))
            .expect("project link");
        links
            .set_checkpoint(
                System::PureCm,
                EntityKind::Project,
                NativeId(1002),
                Checkpoint {
                    year: 2024,
                    month: 3,
                    day: 1,
                    hour: 12,
                    minute: 0,
                    second: 0,
                },
            )
            .expect("checkpoint");
        let document = links.document();

        let home = tempfile::TempDir::new().expect("home");
        let options = Options {
            force_gemini_sync: true,
            ..Options::default()
        };
        let report = build_report(home.path(), &options, document);

        let purecm = &report.systems[1];
        assert_eq!(purecm.system, System::PureCm);
        assert_eq!(purecm.links.task, 1);
        assert_eq!(purecm.links.project, 1);
        assert_eq!(
            purecm.last_checkpoint.as_deref(),
            Some("2024-03-01T12:00:00+00:00")
        );
        assert!(!purecm.force_pending);

        let gemini = &report.systems[0];
        assert_eq!(gemini.links.task, 1);
        assert!(gemini.last_checkpoint.is_none());
        assert!(gemini.force_pending);
        assert!(!report.daemon_running);
    }
}
