//! Socket wire format and the blocking client used by the CLI.
//!
//! Each request and reply is one JSON object on its own line. Requests are
//! tagged by `cmd`; `force` names the system to rescan and `notify` carries
//! the submitted change. A reply holds either `result` or `error`.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tasklink_adapters::ChangeSubmission;
use tasklink_core::System;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// Status polls made while a freshly started daemon binds its socket.
const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    Status,
    /// Run one pass now.
    Sync,
    /// Rescan every project of `system`, then run a pass.
    Force { system: System },
    /// Attach a submitted change to the issues of its linked tasks.
    Notify { change: ChangeSubmission },
    Stop,
}

impl DaemonRequest {
    pub fn name(&self) -> &'static str {
        match self {
            DaemonRequest::Status => "status",
            DaemonRequest::Sync => "sync",
            DaemonRequest::Force { .. } => "force",
            DaemonRequest::Notify { .. } => "notify",
            DaemonRequest::Stop => "stop",
        }
    }

    /// The daemon closes the connection after answering.
    pub fn ends_session(&self) -> bool {
        matches!(self, DaemonRequest::Stop)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonReply {
    Result(Value),
    Error(String),
}

impl DaemonReply {
    /// Unwrap the result; an `error` reply becomes [`DaemonError::Refused`].
    pub fn into_result(self, request: &DaemonRequest) -> Result<Value, DaemonError> {
        match self {
            DaemonReply::Result(value) => Ok(value),
            DaemonReply::Error(reason) => Err(DaemonError::Refused {
                request: request.name(),
                reason,
            }),
        }
    }
}

impl<E: std::fmt::Display> From<Result<Value, E>> for DaemonReply {
    fn from(result: Result<Value, E>) -> Self {
        match result {
            Ok(value) => DaemonReply::Result(value),
            Err(err) => DaemonReply::Error(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking client for the daemon serving one home directory.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(home: &Path) -> Self {
        Self {
            socket: socket_path(home),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// One status round trip, without waiting for a starting daemon.
    pub fn is_running(&self) -> bool {
        self.call(&DaemonRequest::Status).is_ok()
    }

    /// Status payload. Retries briefly while the socket is not bound yet.
    pub fn status(&self) -> Result<Value, DaemonError> {
        let mut attempt = 1;
        loop {
            match self.call(&DaemonRequest::Status) {
                Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                    attempt += 1;
                    sleep(STATUS_RETRY_DELAY);
                }
                outcome => return outcome,
            }
        }
    }

    /// Summary of the pass the daemon ran for this request.
    pub fn sync(&self) -> Result<Value, DaemonError> {
        self.call(&DaemonRequest::Sync)
    }

    pub fn force(&self, system: System) -> Result<Value, DaemonError> {
        self.call(&DaemonRequest::Force { system })
    }

    /// Notify report for `change`.
    pub fn notify(&self, change: ChangeSubmission) -> Result<Value, DaemonError> {
        self.call(&DaemonRequest::Notify { change })
    }

    pub fn stop(&self) -> Result<(), DaemonError> {
        self.call(&DaemonRequest::Stop).map(|_| ())
    }

    /// Send `request` and unwrap the reply.
    pub fn call(&self, request: &DaemonRequest) -> Result<Value, DaemonError> {
        self.exchange(request)?.into_result(request)
    }

    /// Send one request line and read one reply line.
    pub fn exchange<T: Serialize>(&self, request: &T) -> Result<DaemonReply, DaemonError> {
        let stream = self.connect()?;
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        (&stream)
            .write_all(&line)
            .map_err(|e| io_err(&self.socket, e))?;

        let mut reply = String::new();
        let read = BufReader::new(&stream)
            .read_line(&mut reply)
            .map_err(|e| io_err(&self.socket, e))?;
        if read == 0 {
            return Err(DaemonError::Protocol(
                "daemon closed the connection without replying".to_string(),
            ));
        }
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    fn connect(&self) -> Result<UnixStream, DaemonError> {
        UnixStream::connect(&self.socket).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                DaemonError::DaemonNotRunning {
                    socket: self.socket.clone(),
                }
            }
            _ => io_err(&self.socket, err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn requests_are_tagged_by_cmd() {
        let force: DaemonRequest =
            serde_json::from_str(r#"{"cmd":"force","system":"purecm"}"#).expect("request");
        assert!(matches!(force, DaemonRequest::Force { system: System::PureCm }));

        let encoded = serde_json::to_value(DaemonRequest::Status).expect("encode");
        assert_eq!(encoded, json!({ "cmd": "status" }));
    }

    #[test]
    fn force_without_a_system_does_not_parse() {
        let err = serde_json::from_str::<DaemonRequest>(r#"{"cmd":"force"}"#).expect_err("invalid");
        assert!(err.to_string().contains("system"), "got: {err}");
        assert!(serde_json::from_str::<DaemonRequest>(r#"{"cmd":"reboot"}"#).is_err());
    }

    #[test]
    fn notify_accepts_a_minimal_change() {
        let request: DaemonRequest = serde_json::from_str(
            r#"{"cmd":"notify","change":{"change_id":7,"client":"ws","linked_tasks":[1001]}}"#,
        )
        .expect("request");
        let DaemonRequest::Notify { change } = request else {
            panic!("expected notify, got {request:?}");
        };
        assert_eq!(change.change_id, 7);
        assert_eq!(change.linked_tasks.len(), 1);
        assert!(change.items.is_empty());
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().expect("home");
        let client = DaemonClient::new(home.path());
        let err = client.sync().expect_err("no daemon");
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
        assert!(!client.is_running());
    }

    #[test]
    fn error_reply_names_the_refused_request() {
        let reply: DaemonReply = serde_json::from_str(r#"{"error":"queue closed"}"#).expect("reply");
        let err = reply.into_result(&DaemonRequest::Sync).expect_err("refused");
        assert!(
            matches!(&err, DaemonError::Refused { request: "sync", reason } if reason == "queue closed")
        );

        let ok = DaemonReply::from(Ok::<_, DaemonError>(json!({ "stopping": true })));
        assert_eq!(
            serde_json::to_string(&ok).expect("encode"),
            r#"{"result":{"stopping":true}}"#
        );
    }
}
