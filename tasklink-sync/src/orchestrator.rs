//! Sync Orchestrator: owns both adapters, the identity map and one
//! [`Monitor`] per system, and is the single entry point a host calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use tasklink_adapters::{ChangeSubmission, SystemAdapter};
use tasklink_core::{Checkpoint, EntityKind, NativeId, Options, System};

use crate::error::SyncError;
use crate::identity::IdentityMap;
use crate::monitor::{Monitor, MonitorReport};
use crate::reconciler::ReconcileOptions;

/// One system's check that ended with a pass-fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemFailure {
    pub system: System,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    /// Reports of the checks that completed, in run order.
    pub reports: Vec<(System, MonitorReport)>,
    pub failures: Vec<SystemFailure>,
}

impl PassSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn report(&self, system: System) -> Option<&MonitorReport> {
        self.reports.iter().find(|(s, _)| *s == system).map(|(_, r)| r)
    }
}

/// Result of forwarding a submitted change to the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub pass: Option<PassSummary>,
    /// `(purecm task, gemini issue)` pairs the change was attached to.
    pub attached: Vec<(NativeId, NativeId)>,
    /// Linked tasks with no tracker counterpart.
    pub unlinked: Vec<NativeId>,
    pub errors: Vec<String>,
}

pub struct Orchestrator {
    gemini: Box<dyn SystemAdapter>,
    purecm: Box<dyn SystemAdapter>,
    links: Box<dyn IdentityMap>,
    gemini_monitor: Monitor,
    purecm_monitor: Monitor,
    options: ReconcileOptions,
}

impl Orchestrator {
    /// Wire the pair together. Forced full syncs requested in `options`
    /// apply to the first pass.
    pub fn new(
        gemini: Box<dyn SystemAdapter>,
        purecm: Box<dyn SystemAdapter>,
        links: Box<dyn IdentityMap>,
        options: &Options,
    ) -> Self {
        Self {
            gemini,
            purecm,
            links,
            gemini_monitor: Monitor::new(System::Gemini, options.force_gemini_sync),
            purecm_monitor: Monitor::new(System::PureCm, options.force_purecm_sync),
            options: ReconcileOptions {
                update_url: options.update_url,
            },
        }
    }

    pub fn links(&self) -> &dyn IdentityMap {
        self.links.as_ref()
    }

    pub fn monitor(&self, system: System) -> &Monitor {
        match system {
            System::Gemini => &self.gemini_monitor,
            System::PureCm => &self.purecm_monitor,
        }
    }

    pub fn request_forced_full_sync(&mut self, system: System) {
        info!(system = %system, "forced full sync requested");
        match system {
            System::Gemini => self.gemini_monitor.request_full_sync(),
            System::PureCm => self.purecm_monitor.request_full_sync(),
        }
    }

    pub fn run_pass(&mut self) -> PassSummary {
        self.run_pass_at(Utc::now())
    }

    /// Gemini changes first, then PureCM. A system that fails does not stop
    /// the other.
    pub fn run_pass_at(&mut self, now: DateTime<Utc>) -> PassSummary {
        let mut summary = PassSummary {
            started_at: now,
            reports: Vec::new(),
            failures: Vec::new(),
        };

        let gemini_result = self.gemini_monitor.check_for_updates(
            self.gemini.as_ref(),
            self.purecm.as_ref(),
            self.links.as_mut(),
            self.options,
            now,
        );
        record(&mut summary, System::Gemini, gemini_result);

        let purecm_result = self.purecm_monitor.check_for_updates(
            self.purecm.as_ref(),
            self.gemini.as_ref(),
            self.links.as_mut(),
            self.options,
            now,
        );
        record(&mut summary, System::PureCm, purecm_result);

        summary
    }

    pub fn notify_external_change(&mut self, change: &ChangeSubmission) -> NotifyReport {
        self.notify_external_change_at(change, Utc::now())
    }

    /// Push a submitted change to the tracker issues of its linked tasks.
    /// Runs one pass first when a linked task has a counterpart or still
    /// exists in the ledger, so tasks created since the last poll are
    /// mirrored. Failures are reported, never returned.
    pub fn notify_external_change_at(
        &mut self,
        change: &ChangeSubmission,
        now: DateTime<Utc>,
    ) -> NotifyReport {
        let mut report = NotifyReport::default();
        if change.linked_tasks.iter().any(|&task| self.can_attach(task)) {
            report.pass = Some(self.run_pass_at(now));
        } else if !change.linked_tasks.is_empty() {
            info!(change = change.change_id, "no linked task is known to the ledger, pass skipped");
        }

        for &task in &change.linked_tasks {
            let Some(peer) = self.links.get(System::PureCm, EntityKind::Task, task) else {
                info!(task = %task, change = change.change_id, "task has no tracker counterpart");
                report.unlinked.push(task);
                continue;
            };
            match self.attach(change, peer.id) {
                Ok(()) => {
                    info!(task = %task, issue = %peer.id, change = change.change_id, "change attached");
                    report.attached.push((task, peer.id));
                }
                Err(e) => {
                    warn!(task = %task, issue = %peer.id, change = change.change_id, error = %e, "change not attached");
                    report.errors.push(e.to_string());
                }
            }
        }
        report
    }

    /// Linked already, or a ledger task the pass may mirror.
    fn can_attach(&self, task: NativeId) -> bool {
        if self.links.get(System::PureCm, EntityKind::Task, task).is_some() {
            return true;
        }
        match self.purecm.get_task(task) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(task = %task, error = %e, "ledger lookup failed");
                false
            }
        }
    }

    fn attach(&mut self, change: &ChangeSubmission, issue: NativeId) -> Result<(), SyncError> {
        self.gemini.attach_change(issue, change)?;
        // The comment revises the issue; record that so it is not echoed.
        if let Some(task) = self.gemini.get_task(issue)? {
            self.links.set_checkpoint(
                System::Gemini,
                EntityKind::Task,
                issue,
                Checkpoint::from_datetime(task.modified),
            )?;
        }
        Ok(())
    }
}

fn record(summary: &mut PassSummary, system: System, result: Result<MonitorReport, SyncError>) {
    match result {
        Ok(report) => summary.reports.push((system, report)),
        Err(e) => summary.failures.push(SystemFailure {
            system,
            error: e.to_string(),
        }),
    }
}
