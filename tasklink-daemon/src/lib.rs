//! Daemon runtime: interval timer + pass processor + socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{DaemonClient, DaemonReply, DaemonRequest};
pub use runtime::{http_connector, run, run_with, start_blocking, Connector, DaemonStats};
