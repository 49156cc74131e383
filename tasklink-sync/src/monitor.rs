//! Change Monitor: one per system.
//!
//! A check walks every includable project of the source system, fetches the
//! tasks modified since the project checkpoint, drops the ones whose task
//! checkpoint already covers their modification time (our own writes echoed
//! back) and hands the rest to a [`Reconciler`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use tasklink_adapters::SystemAdapter;
use tasklink_core::{Checkpoint, EntityKind, System};

use crate::error::SyncError;
use crate::identity::IdentityMap;
use crate::reconciler::{ReconcileOptions, Reconciler, TaskOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Scanning,
    Processing,
}

/// Counters for one check of one system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub projects_scanned: usize,
    pub projects_skipped: usize,
    pub tasks_seen: usize,
    pub echoes_skipped: usize,
    pub new_tasks: usize,
    pub existing_tasks: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// The check ignored stored project checkpoints.
    pub forced: bool,
}

impl MonitorReport {
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug)]
pub struct Monitor {
    system: System,
    force_full_sync: bool,
    state: MonitorState,
}

impl Monitor {
    pub fn new(system: System, force_full_sync: bool) -> Self {
        Self {
            system,
            force_full_sync,
            state: MonitorState::Idle,
        }
    }

    pub fn system(&self) -> System {
        self.system
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn force_full_sync_pending(&self) -> bool {
        self.force_full_sync
    }

    /// The next check scans from the epoch. Consumed by the first check that
    /// completes.
    pub fn request_full_sync(&mut self) {
        self.force_full_sync = true;
    }

    /// Run one check of `source` against `target`.
    ///
    /// # Errors
    ///
    /// Only pass-fatal errors (an unavailable system or a failing identity
    /// store) are returned; entity failures are logged and counted.
    pub fn check_for_updates(
        &mut self,
        source: &dyn SystemAdapter,
        target: &dyn SystemAdapter,
        links: &mut dyn IdentityMap,
        options: ReconcileOptions,
        now: DateTime<Utc>,
    ) -> Result<MonitorReport, SyncError> {
        self.state = MonitorState::Scanning;
        let result = self.scan(source, target, links, options, now);
        self.state = MonitorState::Idle;

        match &result {
            Ok(report) => {
                if report.forced {
                    self.force_full_sync = false;
                }
                info!(
                    system = %self.system,
                    projects = report.projects_scanned,
                    created = report.created,
                    updated = report.updated,
                    failed = report.failed,
                    "check complete"
                );
            }
            Err(e) => error!(system = %self.system, error = %e, "check aborted"),
        }
        result
    }

    fn scan(
        &mut self,
        source: &dyn SystemAdapter,
        target: &dyn SystemAdapter,
        links: &mut dyn IdentityMap,
        options: ReconcileOptions,
        now: DateTime<Utc>,
    ) -> Result<MonitorReport, SyncError> {
        let system = self.system;
        let mut report = MonitorReport {
            forced: self.force_full_sync,
            ..MonitorReport::default()
        };
        let finished = Checkpoint::from_datetime(now);

        for project in source.list_projects()? {
            if !project.includable {
                debug!(system = %system, project = %project.name, "project not included");
                report.projects_skipped += 1;
                continue;
            }

            let stored = links.checkpoint(system, EntityKind::Project, project.id);
            let since = if report.forced {
                Checkpoint::UNSET
            } else {
                stored
            };

            self.state = MonitorState::Scanning;
            let tasks = match source.recent_tasks(project.id, since.to_datetime()) {
                Ok(tasks) => tasks,
                Err(e) if e.is_unavailable() => return Err(e.into()),
                Err(e) => {
                    warn!(system = %system, project = %project.name, error = %e, "project skipped");
                    report.projects_skipped += 1;
                    continue;
                }
            };

            self.state = MonitorState::Processing;
            for task in tasks {
                report.tasks_seen += 1;
                if links
                    .checkpoint(system, EntityKind::Task, task.id)
                    .covers(task.modified)
                {
                    report.echoes_skipped += 1;
                    continue;
                }
                if links.get(system, EntityKind::Task, task.id).is_some() {
                    report.existing_tasks += 1;
                } else {
                    report.new_tasks += 1;
                }

                let outcome = Reconciler::new(source, target, links, options).reconcile_task(&task);
                match outcome {
                    Ok(TaskOutcome::Created { .. }) => report.created += 1,
                    Ok(TaskOutcome::Updated { .. }) => report.updated += 1,
                    Ok(TaskOutcome::Unchanged { .. }) => report.unchanged += 1,
                    Err(e) if e.is_pass_fatal() => return Err(e),
                    Err(e @ (SyncError::MissingRequiredField { .. } | SyncError::NotIncluded { .. })) => {
                        info!(system = %system, task = %task.name, id = %task.id, reason = %e, "task skipped");
                        report.failed += 1;
                    }
                    Err(e) => {
                        warn!(system = %system, task = %task.name, id = %task.id, reason = %e, "task skipped");
                        report.failed += 1;
                    }
                }
            }

            // Never move a project checkpoint backwards.
            links.set_checkpoint(system, EntityKind::Project, project.id, finished.max(stored))?;
            report.projects_scanned += 1;
        }

        Ok(report)
    }
}
