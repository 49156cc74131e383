//! Error types for tasklink-sync.

use std::path::PathBuf;

use thiserror::Error;

use tasklink_adapters::AdapterError;
use tasklink_core::{ConfigError, EntityKind, NativeId, System};

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A creation prerequisite is absent; nothing was written.
    #[error("{kind} '{name}' ({id}) has no {field}; not created")]
    MissingRequiredField {
        kind: EntityKind,
        name: String,
        id: NativeId,
        field: &'static str,
    },

    #[error("{kind} '{name}' ({id}) is excluded from sync")]
    NotIncluded {
        kind: EntityKind,
        name: String,
        id: NativeId,
    },

    /// A reference could not be followed: dangling link, missing source
    /// entity or a parent cycle.
    #[error("{kind} '{name}' ({id}) cannot be resolved: {reason}")]
    Unresolvable {
        kind: EntityKind,
        name: String,
        id: NativeId,
        reason: String,
    },

    /// An attempt to point an existing link at a different peer.
    #[error("{system} {kind} {id} is already linked to {existing}, refusing to relink to {requested}")]
    LinkConflict {
        system: System,
        kind: EntityKind,
        id: NativeId,
        existing: NativeId,
        requested: NativeId,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (identity store).
    #[error("identity store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Errors that end the current pass for one system. Everything else
    /// skips a single entity.
    pub fn is_pass_fatal(&self) -> bool {
        match self {
            SyncError::Adapter(e) => e.is_unavailable(),
            SyncError::Io { .. } | SyncError::Json(_) | SyncError::Config(_) => true,
            _ => false,
        }
    }

    pub(crate) fn unresolvable(
        kind: EntityKind,
        name: &str,
        id: NativeId,
        reason: impl Into<String>,
    ) -> Self {
        SyncError::Unresolvable {
            kind,
            name: name.to_owned(),
            id,
            reason: reason.into(),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
