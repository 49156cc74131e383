use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use tasklink_adapters::ChangeSubmission;
use tasklink_core::{config, Options, System};
use tasklink_sync::{pipeline, NotifyReport, Orchestrator, PassSummary, SyncError};

use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path};
use crate::protocol::{DaemonReply, DaemonRequest};

/// Builds the orchestrator the processor drives. Called lazily and again
/// after a failed attempt, so an unreachable system at startup is retried on
/// the next job.
pub type Connector = Arc<dyn Fn(&Path, &Options) -> Result<Orchestrator, SyncError> + Send + Sync>;

/// HTTP services plus the identity store under `home`.
pub fn http_connector() -> Connector {
    Arc::new(pipeline::connect_at)
}

#[derive(Debug, Clone)]
enum JobKind {
    Pass,
    Force(System),
    Notify(ChangeSubmission),
}

impl JobKind {
    fn label(&self) -> String {
        match self {
            JobKind::Pass => "pass".to_string(),
            JobKind::Force(system) => format!("force {}", system.key()),
            JobKind::Notify(change) => format!("notify change {}", change.change_id),
        }
    }
}

struct Job {
    kind: JobKind,
    source: &'static str,
    respond_to: oneshot::Sender<Result<Value, String>>,
}

#[derive(Debug)]
enum JobOutcome {
    Pass(PassSummary),
    Notify(NotifyReport),
}

impl JobOutcome {
    fn pass(&self) -> Option<&PassSummary> {
        match self {
            JobOutcome::Pass(summary) => Some(summary),
            JobOutcome::Notify(report) => report.pass.as_ref(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            JobOutcome::Pass(summary) => json!(summary),
            JobOutcome::Notify(report) => json!(report),
        }
    }
}

/// Counters reported by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStats {
    pub started_at: DateTime<Utc>,
    pub passes: u64,
    /// Passes in which at least one system's check aborted.
    pub failed_passes: u64,
    pub notifications: u64,
    pub connected: bool,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_pass: Option<PassSummary>,
    pub last_error: Option<String>,
}

impl DaemonStats {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            passes: 0,
            failed_passes: 0,
            notifications: 0,
            connected: false,
            last_pass_at: None,
            last_pass: None,
            last_error: None,
        }
    }

    fn record(&mut self, kind: &JobKind, result: &Result<JobOutcome, String>) {
        match result {
            Ok(outcome) => {
                self.connected = true;
                if matches!(kind, JobKind::Notify(_)) {
                    self.notifications += 1;
                }
                if let Some(summary) = outcome.pass() {
                    self.passes += 1;
                    if !summary.is_clean() {
                        self.failed_passes += 1;
                    }
                    self.last_pass_at = Some(summary.started_at);
                    self.last_pass = Some(summary.clone());
                }
            }
            Err(err) => {
                self.connected = false;
                self.last_error = Some(err.clone());
            }
        }
    }
}

/// State moved into the blocking pool for each job and handed back after.
struct Worker {
    home: PathBuf,
    options: Options,
    connector: Connector,
    orchestrator: Option<Orchestrator>,
}

impl Worker {
    fn handle(&mut self, kind: JobKind) -> Result<JobOutcome, SyncError> {
        let orchestrator = match &mut self.orchestrator {
            Some(orchestrator) => orchestrator,
            slot => {
                let connected = (self.connector)(&self.home, &self.options)?;
                tracing::info!("connected to Gemini and PureCM");
                slot.insert(connected)
            }
        };

        let outcome = match kind {
            JobKind::Pass => JobOutcome::Pass(orchestrator.run_pass()),
            JobKind::Force(system) => {
                orchestrator.request_forced_full_sync(system);
                JobOutcome::Pass(orchestrator.run_pass())
            }
            JobKind::Notify(change) => {
                JobOutcome::Notify(orchestrator.notify_external_change(&change))
            }
        };

        if let Some(summary) = outcome.pass() {
            if let Err(err) =
                pipeline::clear_consumed_force_flags(&self.home, &mut self.options, summary)
            {
                tracing::warn!(error = %err, "could not persist consumed force flags");
            }
        }
        Ok(outcome)
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the configured HTTP services.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let load_home = home.clone();
    let options = tokio::task::spawn_blocking(move || config::load_at(&load_home))
        .await
        .map_err(|err| DaemonError::Protocol(format!("config load join error: {err}")))??;
    run_with(home, options, http_connector()).await
}

/// Run the daemon with an explicit connector.
pub async fn run_with(
    home: PathBuf,
    options: Options,
    connector: Connector,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let interval = Duration::from_secs(options.interval_secs.max(1));
    let stats = Arc::new(RwLock::new(DaemonStats::new(Utc::now())));

    let (job_tx, job_rx) = mpsc::channel::<Job>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    tracing::info!(
        home = %home.display(),
        interval_secs = interval.as_secs(),
        "tasklink daemon starting",
    );

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = timer_task(interval, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let worker = Worker {
            home: home.clone(),
            options,
            connector,
            orchestrator: None,
        };
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = processor_task(worker, stats, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let stats = stats.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                stats,
                job_tx,
                interval,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };
    drop(job_tx);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (timer_result, processor_result, socket_result, signal_result) =
        tokio::join!(timer_handle, processor_handle, socket_handle, signal_handle);

    handle_join("timer", timer_result)?;
    handle_join("processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("tasklink daemon stopped");
    Ok(())
}

/// Runs a pass immediately, then one `interval` after each pass completes.
async fn timer_task(
    interval: Duration,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        match enqueue(&job_tx, JobKind::Pass, "timer").await {
            Ok(_) => {}
            Err(DaemonError::ChannelClosed(_)) => break,
            Err(err) => tracing::error!(error = %err, "timer-triggered pass failed"),
        }

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    Ok(())
}

async fn processor_task(
    mut worker: Worker,
    stats: Arc<RwLock<DaemonStats>>,
    mut job_rx: mpsc::Receiver<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let label = job.kind.label();
                let kind = job.kind.clone();

                let (returned, result) = tokio::task::spawn_blocking(move || {
                    let result = worker.handle(kind);
                    (worker, result)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("pass task join error: {err}")))?;
                worker = returned;

                let result = result.map_err(|err| err.to_string());
                match &result {
                    Ok(outcome) => tracing::info!(
                        job = %label,
                        source = job.source,
                        clean = outcome.pass().map_or(true, PassSummary::is_clean),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "job completed",
                    ),
                    Err(err) => tracing::error!(
                        job = %label,
                        source = job.source,
                        error = %err,
                        "job failed",
                    ),
                }
                stats.write().await.record(&job.kind, &result);

                let _ = job.respond_to.send(result.map(|outcome| outcome.to_value()));
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    stats: Arc<RwLock<DaemonStats>>,
    job_tx: mpsc::Sender<Job>,
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let stats = stats.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, stats, job_tx, interval, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    stats: Arc<RwLock<DaemonStats>>,
    job_tx: mpsc::Sender<Job>,
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_reply(&mut writer, &DaemonReply::Error(format!("invalid request: {err}")))
                    .await?;
                continue;
            }
        };
        tracing::debug!(cmd = request.name(), "socket request");

        let ends_session = request.ends_session();
        let reply = match request {
            DaemonRequest::Status => {
                let snapshot = stats.read().await.clone();
                DaemonReply::Result(build_status_payload(&home, &snapshot, interval))
            }
            DaemonRequest::Sync => enqueue(&job_tx, JobKind::Pass, "socket").await.into(),
            DaemonRequest::Force { system } => {
                enqueue(&job_tx, JobKind::Force(system), "socket").await.into()
            }
            DaemonRequest::Notify { change } => {
                enqueue(&job_tx, JobKind::Notify(change), "socket").await.into()
            }
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonReply::Result(json!({ "stopping": true }))
            }
        };

        write_reply(&mut writer, &reply).await?;
        if ends_session {
            break;
        }
    }

    Ok(())
}

fn build_status_payload(home: &Path, stats: &DaemonStats, interval: Duration) -> Value {
    json!({
        "running": true,
        "started_at": stats.started_at,
        "interval_secs": interval.as_secs(),
        "connected": stats.connected,
        "passes": stats.passes,
        "failed_passes": stats.failed_passes,
        "notifications": stats.notifications,
        "last_pass_at": stats.last_pass_at,
        "last_pass": stats.last_pass,
        "last_error": stats.last_error,
        "socket": socket_path(home).display().to_string(),
    })
}

async fn enqueue(
    job_tx: &mpsc::Sender<Job>,
    kind: JobKind,
    source: &'static str,
) -> Result<Value, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(Job {
            kind,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("job queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("job response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

async fn write_reply(writer: &mut OwnedWriteHalf, reply: &DaemonReply) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(reply)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
