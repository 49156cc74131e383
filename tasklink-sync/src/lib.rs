//! # tasklink-sync
//!
//! Identity map, reconciler, change monitor and orchestrator.
//!
//! Hosts build an [`Orchestrator`] (usually through [`pipeline::connect_at`])
//! and call [`Orchestrator::run_pass`] on a timer and
//! [`Orchestrator::notify_external_change`] when a change is submitted.

pub mod error;
pub mod identity;
pub mod monitor;
pub mod orchestrator;
pub mod pipeline;
pub mod reconciler;

pub use error::SyncError;
pub use identity::{IdentityMap, JsonIdentityStore, LinkDocument, MemoryIdentityMap, PeerRef};
pub use monitor::{Monitor, MonitorReport, MonitorState};
pub use orchestrator::{NotifyReport, Orchestrator, PassSummary, SystemFailure};
pub use reconciler::{ReconcileOptions, Reconciler, TaskField, TaskOutcome};
