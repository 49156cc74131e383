#![allow(dead_code)]

use tasklink_adapters::{Clock, GeminiAdapter, MemoryGemini, MemoryPureCm, PureCmAdapter};
use tasklink_core::config::{CreationSelector, ProjectCreation};
use tasklink_core::{EntityKind, NativeId, Options, System};
use tasklink_sync::{IdentityMap, MemoryIdentityMap, Orchestrator, PassSummary};

pub const GEMINI_URL: &str = "https://gemini.example.com";

/// Options with every kind of creation switched on.
pub fn options() -> Options {
    let mut options = Options::default();
    options.gemini.url = GEMINI_URL.into();
    options.gemini.project_creation = ProjectCreation {
        enabled: true,
        template: Some("Template".into()),
    };
    options.gemini.task_creation = selector("Bug");
    options.gemini.feature_creation = selector("Feature");
    options
}

fn selector(issue_type: &str) -> CreationSelector {
    CreationSelector {
        enabled: true,
        creation_type: Some(issue_type.into()),
        creation_status: Some("Assigned".into()),
        creation_severity: Some("Normal".into()),
    }
}

/// Both systems on one clock. Gemini starts with a `Template` project.
pub struct World {
    pub clock: Clock,
    pub gemini: MemoryGemini,
    pub purecm: MemoryPureCm,
    pub template: NativeId,
}

impl World {
    pub fn new() -> Self {
        let clock = Clock::default();
        let gemini = MemoryGemini::with_clock(clock.clone());
        let purecm = MemoryPureCm::with_clock(clock.clone());
        let template = gemini.add_project("Template");
        Self {
            clock,
            gemini,
            purecm,
            template,
        }
    }

    pub fn orchestrator(&self, options: &Options) -> Orchestrator {
        let gemini = GeminiAdapter::new(self.gemini.clone(), options).expect("gemini adapter");
        let purecm = PureCmAdapter::new(self.purecm.clone(), options);
        Orchestrator::new(
            Box::new(gemini),
            Box::new(purecm),
            Box::new(MemoryIdentityMap::new()),
            options,
        )
    }

    /// A pass at the current clock time that must not fail for either system.
    pub fn pass(&self, orchestrator: &mut Orchestrator) -> PassSummary {
        let summary = orchestrator.run_pass_at(self.clock.now());
        assert!(summary.is_clean(), "pass failed: {:?}", summary.failures);
        summary
    }

    /// `(gemini, purecm)` write counters.
    pub fn writes(&self) -> (usize, usize) {
        (self.gemini.write_count(), self.purecm.write_count())
    }

    /// PureCM task with an owner and a version, the minimum for mirroring.
    pub fn ledger_task(&self, project: NativeId, name: &str, owner: NativeId, version: NativeId) -> NativeId {
        let task = self.purecm.add_task(project, name);
        self.purecm.edit_task(task, |t| {
            t.owner_id = Some(owner.0);
            t.version_id = Some(version.0);
        });
        task
    }
}

pub fn peer(orchestrator: &Orchestrator, system: System, kind: EntityKind, id: NativeId) -> NativeId {
    orchestrator
        .links()
        .get(system, kind, id)
        .unwrap_or_else(|| panic!("{system} {kind} {id} not linked"))
        .id
}
