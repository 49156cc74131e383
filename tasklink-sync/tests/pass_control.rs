//! Pass-level behaviour: checkpoints, forced full syncs, skips, outages and
//! submitted changes.

mod common;

use chrono::Duration;
use tempfile::TempDir;

use tasklink_adapters::{ChangeItem, ChangeKind, ChangeSubmission, GeminiAdapter, PureCmAdapter};
use tasklink_core::{Checkpoint, EntityKind, NativeId, Options, System};
use tasklink_sync::identity::{load_document, store_path_at};
use tasklink_sync::{IdentityMap, JsonIdentityStore, Orchestrator};

use common::{options, peer, World};

// ---------------------------------------------------------------------------
// 1. Checkpoints and forced full syncs
// ---------------------------------------------------------------------------

#[test]
fn forced_full_sync_reevaluates_every_task_once() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    world.ledger_task(project, "Has an owner", alice, release);
    world.purecm.add_task(project, "No owner yet");

    let mut orchestrator = world.orchestrator(&options());
    let first = world.pass(&mut orchestrator);
    let report = first.report(System::PureCm).expect("purecm");
    assert_eq!((report.created, report.failed), (1, 1));

    world.clock.advance(60);
    let quiet = world.pass(&mut orchestrator);
    assert_eq!(quiet.report(System::PureCm).expect("purecm").tasks_seen, 0);

    orchestrator.request_forced_full_sync(System::PureCm);
    assert!(orchestrator.monitor(System::PureCm).force_full_sync_pending());
    world.clock.advance(60);
    let forced = world.pass(&mut orchestrator);
    let report = forced.report(System::PureCm).expect("purecm");
    assert!(report.forced);
    assert_eq!(report.tasks_seen, 2);
    assert_eq!(report.echoes_skipped, 1);
    assert_eq!(report.failed, 1);
    assert!(!orchestrator.monitor(System::PureCm).force_full_sync_pending());

    world.clock.advance(60);
    let after = world.pass(&mut orchestrator);
    let report = after.report(System::PureCm).expect("purecm");
    assert!(!report.forced);
    assert_eq!(report.tasks_seen, 0);
}

#[test]
fn configured_force_flag_applies_to_the_first_pass_only() {
    let world = World::new();
    world.purecm.add_project("Web");
    let options = Options {
        force_purecm_sync: true,
        ..options()
    };

    let mut orchestrator = world.orchestrator(&options);
    assert!(orchestrator.monitor(System::PureCm).force_full_sync_pending());
    assert!(!orchestrator.monitor(System::Gemini).force_full_sync_pending());

    let first = world.pass(&mut orchestrator);
    assert!(first.report(System::PureCm).expect("purecm").forced);
    world.clock.advance(60);
    let second = world.pass(&mut orchestrator);
    assert!(!second.report(System::PureCm).expect("purecm").forced);
}

#[test]
fn project_checkpoint_never_moves_backwards() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let mut orchestrator = world.orchestrator(&options());

    world.clock.advance(600);
    world.pass(&mut orchestrator);
    let stored = orchestrator
        .links()
        .checkpoint(System::PureCm, EntityKind::Project, project);
    assert_eq!(stored, Checkpoint::from_datetime(world.clock.now()));

    let earlier = world.clock.now() - Duration::minutes(5);
    let summary = orchestrator.run_pass_at(earlier);
    assert!(summary.is_clean());
    assert_eq!(
        orchestrator
            .links()
            .checkpoint(System::PureCm, EntityKind::Project, project),
        stored
    );
}

// ---------------------------------------------------------------------------
// 2. Skipped tasks
// ---------------------------------------------------------------------------

#[test]
fn task_with_excluded_owner_creates_nothing() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let bot = world.purecm.add_user("build-bot");
    let release = world.purecm.add_version(project, "1.0", None);
    let task = world.ledger_task(project, "Nightly build failed", bot, release);
    let options = Options {
        excluded_users: vec!["build-bot".into()],
        ..options()
    };

    let mut orchestrator = world.orchestrator(&options);
    let summary = world.pass(&mut orchestrator);

    assert_eq!(summary.report(System::PureCm).expect("purecm").failed, 1);
    assert_eq!(world.gemini.write_count(), 0);
    assert!(orchestrator
        .links()
        .get(System::PureCm, EntityKind::Task, task)
        .is_none());
}

#[test]
fn task_without_owner_creates_nothing() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    world.purecm.add_task(project, "Unassigned");

    let mut orchestrator = world.orchestrator(&options());
    world.pass(&mut orchestrator);

    assert_eq!(world.gemini.write_count(), 0);
    assert_eq!(world.gemini.projects_snapshot().len(), 1);
}

#[test]
fn task_without_version_creates_nothing() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let task = world.purecm.add_task(project, "No release picked");
    world.purecm.edit_task(task, |t| t.owner_id = Some(alice.0));

    let mut orchestrator = world.orchestrator(&options());
    let summary = world.pass(&mut orchestrator);

    let ledger = summary.report(System::PureCm).expect("purecm");
    assert_eq!(ledger.failed, 1);
    assert_eq!(ledger.created, 0);
    assert_eq!(world.gemini.write_count(), 0);
    assert_eq!(world.gemini.issue_count(), 0);
    let links = orchestrator.links();
    assert!(links.get(System::PureCm, EntityKind::Task, task).is_none());
    assert!(links.get(System::PureCm, EntityKind::Project, project).is_none());
    assert!(links.get(System::PureCm, EntityKind::User, alice).is_none());
}

#[test]
fn archived_and_excluded_projects_are_not_scanned() {
    let world = World::new();
    let alice = world.purecm.add_user("alice");
    let legacy = world.purecm.add_project("Legacy");
    let legacy_release = world.purecm.add_version(legacy, "0.9", None);
    world.ledger_task(legacy, "Old bug", alice, legacy_release);
    world.purecm.archive_project(legacy);
    let internal = world.purecm.add_project("Internal");
    let internal_release = world.purecm.add_version(internal, "1.0", None);
    world.ledger_task(internal, "Rotate keys", alice, internal_release);
    let options = Options {
        excluded_projects: vec!["Internal".into()],
        ..options()
    };

    let mut orchestrator = world.orchestrator(&options);
    let summary = world.pass(&mut orchestrator);

    let report = summary.report(System::PureCm).expect("purecm");
    assert_eq!(report.projects_skipped, 2);
    assert_eq!(report.tasks_seen, 0);
    assert_eq!(world.gemini.write_count(), 0);
}

#[test]
fn refused_user_skips_only_that_task() {
    let world = World::new();
    world.gemini.add_user("bob");
    world.gemini.set_user_quota(Some(1));
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let bob = world.purecm.add_user("bob");
    let release = world.purecm.add_version(project, "1.0", None);
    let blocked = world.ledger_task(project, "Owned by alice", alice, release);
    let mirrored = world.ledger_task(project, "Owned by bob", bob, release);

    let mut orchestrator = world.orchestrator(&options());
    let summary = world.pass(&mut orchestrator);

    let report = summary.report(System::PureCm).expect("purecm");
    assert_eq!((report.created, report.failed), (1, 1));
    assert_eq!(world.gemini.issue_count(), 1);
    let links = orchestrator.links();
    assert!(links.get(System::PureCm, EntityKind::Task, blocked).is_none());
    assert!(links.get(System::PureCm, EntityKind::Task, mirrored).is_some());
    assert!(links.get(System::PureCm, EntityKind::User, alice).is_none());
}

// ---------------------------------------------------------------------------
// 3. Outages
// ---------------------------------------------------------------------------

#[test]
fn unavailable_tracker_does_not_stop_the_ledger_check() {
    let world = World::new();
    world.purecm.add_project("Web");
    let mut orchestrator = world.orchestrator(&options());

    world.gemini.set_offline(true);
    let summary = orchestrator.run_pass_at(world.clock.now());

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].system, System::Gemini);
    assert!(summary.report(System::Gemini).is_none());
    assert_eq!(summary.report(System::PureCm).expect("purecm").projects_scanned, 1);
}

#[test]
fn aborted_check_is_retried_on_the_next_pass() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    let task = world.ledger_task(project, "Crash on save", alice, release);
    let mut orchestrator = world.orchestrator(&options());

    world.gemini.set_offline(true);
    let summary = orchestrator.run_pass_at(world.clock.now());
    assert_eq!(summary.failures.len(), 2);
    assert!(orchestrator
        .links()
        .checkpoint(System::PureCm, EntityKind::Project, project)
        .is_unset());

    world.gemini.set_offline(false);
    world.clock.advance(60);
    world.pass(&mut orchestrator);
    peer(&orchestrator, System::PureCm, EntityKind::Task, task);
}

// ---------------------------------------------------------------------------
// 4. Submitted changes
// ---------------------------------------------------------------------------

fn submission(linked: Vec<NativeId>) -> ChangeSubmission {
    ChangeSubmission {
        change_id: 42,
        client: "alice-ws".into(),
        description: "Fix crash on save".into(),
        stream: "/main".into(),
        items: vec![ChangeItem {
            kind: ChangeKind::Edited,
            path: "/main/src/save.rs".into(),
            renamed_to: None,
        }],
        linked_tasks: linked,
    }
}

#[test]
fn submitted_change_is_attached_to_the_issue_without_echo() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    let task = world.ledger_task(project, "Crash on save", alice, release);

    let mut orchestrator = world.orchestrator(&options());
    world.pass(&mut orchestrator);
    let issue = peer(&orchestrator, System::PureCm, EntityKind::Task, task);

    world.clock.advance(60);
    let (gemini_before, purecm_before) = world.writes();
    let stray = NativeId(999_999);
    let report = orchestrator.notify_external_change_at(&submission(vec![task, stray]), world.clock.now());

    assert!(report.pass.is_some());
    assert_eq!(report.attached, vec![(task, issue)]);
    assert_eq!(report.unlinked, vec![stray]);
    assert!(report.errors.is_empty());

    let files = world.gemini.source_files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "save.rs");
    assert_eq!(files[0].issue_id, issue.0);
    let comments = world.gemini.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].comment.starts_with("Change '42' submitted by 'alice-ws'.<br/>"));
    assert_eq!(world.writes(), (gemini_before + 2, purecm_before));

    world.clock.advance(60);
    world.pass(&mut orchestrator);
    assert_eq!(world.writes(), (gemini_before + 2, purecm_before));
}

#[test]
fn change_without_linked_tasks_runs_no_pass() {
    let world = World::new();
    let mut orchestrator = world.orchestrator(&options());

    let report = orchestrator.notify_external_change_at(&submission(Vec::new()), world.clock.now());
    assert!(report.pass.is_none());
    assert!(report.attached.is_empty());
}

#[test]
fn change_for_unknown_tasks_runs_no_pass() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    let mut orchestrator = world.orchestrator(&options());
    world.pass(&mut orchestrator);

    // Created after the last poll, so only a pass would pick it up.
    world.clock.advance(60);
    world.ledger_task(project, "Waiting for the poll", alice, release);
    let stray = NativeId(999_999);
    let report = orchestrator.notify_external_change_at(&submission(vec![stray]), world.clock.now());

    assert!(report.pass.is_none());
    assert_eq!(report.unlinked, vec![stray]);
    assert!(report.attached.is_empty());
    assert_eq!(world.gemini.issue_count(), 0);
    assert!(world.gemini.comments().is_empty());
}

#[test]
fn change_for_a_task_created_since_the_last_poll_is_mirrored_first() {
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    let mut orchestrator = world.orchestrator(&options());
    world.pass(&mut orchestrator);

    world.clock.advance(60);
    let task = world.ledger_task(project, "Brand new", alice, release);
    let report = orchestrator.notify_external_change_at(&submission(vec![task]), world.clock.now());

    let issue = peer(&orchestrator, System::PureCm, EntityKind::Task, task);
    assert_eq!(report.attached, vec![(task, issue)]);
    assert_eq!(world.gemini.comments().len(), 1);
}

// ---------------------------------------------------------------------------
// 5. Persistent identity map
// ---------------------------------------------------------------------------

#[test]
fn links_persist_across_orchestrators() {
    let home = TempDir::new().expect("home");
    let world = World::new();
    let project = world.purecm.add_project("Web");
    let alice = world.purecm.add_user("alice");
    let release = world.purecm.add_version(project, "1.0", None);
    world.ledger_task(project, "Crash on save", alice, release);
    let options = options();

    let build = || {
        Orchestrator::new(
            Box::new(GeminiAdapter::new(world.gemini.clone(), &options).expect("gemini")),
            Box::new(PureCmAdapter::new(world.purecm.clone(), &options)),
            Box::new(JsonIdentityStore::open_at(home.path()).expect("store")),
            &options,
        )
    };

    let mut first = build();
    world.pass(&mut first);
    drop(first);

    let doc = load_document(&store_path_at(home.path())).expect("document");
    assert_eq!(doc.link_count(System::PureCm, EntityKind::Task), 1);
    assert_eq!(doc.checkpoints_of(System::PureCm, EntityKind::Project).len(), 1);

    let before = world.writes();
    world.clock.advance(60);
    let mut second = build();
    world.pass(&mut second);
    assert_eq!(world.writes(), before);
}
