use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use tasklink_adapters::{
    ChangeSubmission, GeminiAdapter, MemoryGemini, MemoryPureCm, PureCmAdapter,
};
use tasklink_core::{NativeId, Options, System};
use tasklink_daemon::{run_with, Connector, DaemonClient, DaemonError, DaemonReply};
use tasklink_sync::{MemoryIdentityMap, Orchestrator, SyncError};

fn connector(gemini: MemoryGemini, purecm: MemoryPureCm) -> Connector {
    Arc::new(move |_home: &Path, options: &Options| -> Result<Orchestrator, SyncError> {
        let gemini_adapter = GeminiAdapter::new(gemini.clone(), options)?;
        let purecm_adapter = PureCmAdapter::new(purecm.clone(), options);
        Ok(Orchestrator::new(
            Box::new(gemini_adapter),
            Box::new(purecm_adapter),
            Box::new(MemoryIdentityMap::new()),
            options,
        ))
    })
}

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking join")
}

async fn wait_for_first_pass(client: &DaemonClient) -> Value {
    for _ in 0..100 {
        let client = client.clone();
        let status = blocking(move || client.status()).await.expect("status");
        if status["passes"].as_u64().unwrap_or(0) >= 1 {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon never completed its first pass");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daemon_serves_sync_force_notify_and_stop_over_its_socket() {
    let home = TempDir::new().expect("home");
    let home_path: PathBuf = home.path().to_path_buf();

    let gemini = MemoryGemini::new();
    let purecm = MemoryPureCm::with_clock(gemini.clock().clone());
    let issue_project = gemini.add_project("Apollo");
    let user = gemini.add_user("ada");
    let version = gemini.add_version(issue_project, "1.0", None);
    let issue = gemini.add_issue(issue_project, "Crash on start");
    gemini.edit_issue(issue, |i| {
        i.resources = vec![user.0];
        i.fixed_in_version = version.0;
    });

    let options = Options {
        interval_secs: 3600,
        ..Options::default()
    };
    let daemon = tokio::spawn(run_with(
        home_path.clone(),
        options,
        connector(gemini.clone(), purecm.clone()),
    ));

    let client = DaemonClient::new(&home_path);
    let status = wait_for_first_pass(&client).await;
    assert_eq!(status["running"], Value::Bool(true));
    assert_eq!(status["connected"], Value::Bool(true));
    assert_eq!(status["interval_secs"].as_u64(), Some(3600));
    assert_eq!(purecm.task_count(), 1);

    let c = client.clone();
    let summary = blocking(move || c.sync()).await.expect("sync");
    assert!(summary["failures"].as_array().is_some_and(Vec::is_empty));

    let c = client.clone();
    let forced = blocking(move || c.force(System::PureCm)).await.expect("force");
    let reports = forced["reports"].as_array().expect("reports");
    assert!(reports
        .iter()
        .any(|entry| entry[0] == "purecm" && entry[1]["forced"] == Value::Bool(true)));

    // No linked task is known to the ledger, so no pass runs.
    let c = client.clone();
    let orphan = ChangeSubmission {
        change_id: 9,
        client: "ws".into(),
        description: "tidy".into(),
        stream: "main".into(),
        items: Vec::new(),
        linked_tasks: vec![NativeId(424_242)],
    };
    let report = blocking(move || c.notify(orphan)).await.expect("notify");
    assert_eq!(report["unlinked"], serde_json::json!([424_242]));
    assert!(report["pass"].is_null());

    let c = client.clone();
    let rejected = blocking(move || c.exchange(&serde_json::json!({ "cmd": "force" })))
        .await
        .expect("reply");
    assert!(
        matches!(&rejected, DaemonReply::Error(reason) if reason.starts_with("invalid request")),
        "got: {rejected:?}"
    );

    let c = client.clone();
    let status = blocking(move || c.status()).await.expect("status");
    assert_eq!(status["passes"].as_u64(), Some(3));
    assert_eq!(status["notifications"].as_u64(), Some(1));

    let c = client.clone();
    blocking(move || c.stop()).await.expect("stop");
    let result = tokio::time::timeout(Duration::from_secs(10), daemon)
        .await
        .expect("daemon exits")
        .expect("join");
    assert!(result.is_ok(), "daemon error: {result:?}");
    assert!(!tasklink_daemon::paths::socket_path(&home_path).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_reports_a_missing_daemon() {
    let home = TempDir::new().expect("home");
    let client = DaemonClient::new(home.path());
    let err = blocking(move || client.status()).await.expect_err("no daemon");
    assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
}
