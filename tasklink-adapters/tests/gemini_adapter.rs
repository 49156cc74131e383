//! GeminiAdapter behaviour against the in-memory tracker.

use chrono::Duration;
use rstest::rstest;
use tasklink_adapters::{
    AdapterError, ChangeItem, ChangeKind, ChangeSubmission, GeminiAdapter, MemoryGemini, NewTask,
    TaskStore,
};
use tasklink_core::config::CreationSelector;
use tasklink_core::{NativeId, Options, TaskState};

fn options() -> Options {
    let mut options = Options::default();
    options.gemini.url = "https://gemini.example.com".into();
    options.gemini.task_creation = CreationSelector {
        enabled: true,
        creation_type: Some("Bug".into()),
        creation_status: Some("Assigned".into()),
        creation_severity: Some("Normal".into()),
    };
    options.gemini.feature_creation = CreationSelector {
        enabled: true,
        creation_type: Some("Feature".into()),
        creation_status: Some("Assigned".into()),
        creation_severity: Some("Normal".into()),
    };
    options
}

// ---------------------------------------------------------------------------
// 1. Change listing
// ---------------------------------------------------------------------------

#[test]
fn recent_tasks_refilters_same_day_issues_to_the_second() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let early = gemini.add_issue(project, "early");
    gemini.clock().advance(3600);
    let since = gemini.clock().now();
    gemini.clock().advance(1);
    let late = gemini.add_issue(project, "late");

    let adapter = GeminiAdapter::new(gemini, &options()).unwrap();
    let ids: Vec<NativeId> = adapter
        .recent_tasks(project, since)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![late]);
    assert!(!ids.contains(&early));
}

#[test]
fn recent_tasks_includes_closed_issues() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let issue = gemini.add_issue(project, "done");
    let fixed = gemini.resolution_id("Fixed").unwrap();
    gemini.edit_issue(issue, |i| i.resolution = fixed);

    let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();
    let since = gemini.clock().now() - Duration::seconds(10);
    let tasks = adapter.recent_tasks(project, since).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state, TaskState::Closed);
}

// ---------------------------------------------------------------------------
// 2. Vocabulary
// ---------------------------------------------------------------------------

#[rstest]
#[case(5, 1)]
#[case(4, 2)]
#[case(1, 5)]
fn highest_order_reads_as_canonical_one(#[case] order: u16, #[case] canonical: u16) {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let issue = gemini.add_issue(project, "x");
    let priority = gemini.priority_id(project, order).unwrap();
    gemini.edit_issue(issue, |i| i.priority = priority);

    let adapter = GeminiAdapter::new(gemini, &options()).unwrap();
    assert_eq!(adapter.get_task(issue).unwrap().unwrap().priority, canonical);
}

#[test]
fn closing_picks_last_final_resolution() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let issue = gemini.add_issue(project, "x");
    let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();

    adapter.set_state(issue, TaskState::Completed).unwrap();
    let wont_fix = gemini.resolution_id("Won't Fix").unwrap();
    assert_eq!(gemini.issue_snapshot(issue).unwrap().resolution, wont_fix);

    adapter.set_state(issue, TaskState::Open).unwrap();
    let unresolved = gemini.resolution_id("Unresolved").unwrap();
    assert_eq!(gemini.issue_snapshot(issue).unwrap().resolution, unresolved);
}

// ---------------------------------------------------------------------------
// 3. Creation
// ---------------------------------------------------------------------------

#[test]
fn created_issue_uses_selectors_and_fills_description() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();

    let fields = NewTask {
        name: "Export to CSV".into(),
        priority: 1,
        state: TaskState::Open,
        is_feature: true,
        ..NewTask::default()
    };
    let task = adapter.create_task(project, &fields).unwrap();
    assert!(task.is_feature);
    assert_eq!(task.priority, 1);
    assert_eq!(task.url, format!("https://gemini.example.com/Default.aspx?id={}", task.id));

    let stored = gemini.issue_snapshot(task.id).unwrap();
    assert_eq!(stored.long_desc, "Export to CSV");
    assert_eq!(stored.risk_level, 1);
}

// ---------------------------------------------------------------------------
// 4. Submitted changes
// ---------------------------------------------------------------------------

#[test]
fn attach_change_links_files_and_comments() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let issue = gemini.add_issue(project, "x");
    let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();

    let change = ChangeSubmission {
        change_id: 77,
        client: "build-ws".into(),
        description: "fix export".into(),
        stream: "/main".into(),
        items: vec![
            ChangeItem { kind: ChangeKind::Edited, path: "src/export.rs".into(), renamed_to: None },
            ChangeItem {
                kind: ChangeKind::Renamed,
                path: "src/old.rs".into(),
                renamed_to: Some("src/new.rs".into()),
            },
        ],
        linked_tasks: vec![],
    };
    adapter.attach_change(issue, &change).unwrap();

    let files = gemini.source_files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[1].file_name, "new.rs");
    let comments = gemini.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].comment.starts_with("Change '77' submitted by 'build-ws'."));
    assert!(comments[0].comment.contains("Renamed 'src/old.rs' to 'src/new.rs'"));
}

// ---------------------------------------------------------------------------
// 5. Failure classes
// ---------------------------------------------------------------------------

#[test]
fn undecodable_issue_fails_only_that_task() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let broken = gemini.add_issue(project, "broken");
    let healthy = gemini.add_issue(project, "healthy");
    gemini.corrupt_issue(broken);

    let adapter = GeminiAdapter::new(gemini, &options()).unwrap();
    let err = adapter.get_task(broken).unwrap_err();
    assert!(!err.is_unavailable(), "decode failure must not abort the pass: {err}");
    assert!(matches!(err, AdapterError::Rejected { .. }));
    assert_eq!(adapter.get_task(healthy).unwrap().unwrap().name, "healthy");
}

#[test]
fn offline_tracker_is_unavailable() {
    let gemini = MemoryGemini::new();
    let project = gemini.add_project("Web");
    let issue = gemini.add_issue(project, "x");
    let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();

    gemini.set_offline(true);
    assert!(adapter.get_task(issue).unwrap_err().is_unavailable());
}
