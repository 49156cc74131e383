//! Error types for tasklink-adapters.

use thiserror::Error;

use tasklink_core::{EntityKind, NativeId, System};

pub type ServiceResult<T> = Result<T, ServiceError>;
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Failure of a single remote call.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Connection refused, DNS failure, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected")]
    Unauthorized,

    /// Non-success status the client has no better mapping for.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The server understood the request and refused it (validation, licence).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// True when the failure says nothing about the entity and everything
    /// about the link to the server.
    pub fn is_connectivity(&self) -> bool {
        match self {
            ServiceError::Transport(_) | ServiceError::Unauthorized => true,
            ServiceError::Status { code, .. } => *code >= 500,
            ServiceError::Decode(_) | ServiceError::Rejected(_) => false,
        }
    }
}

/// Errors surfaced by a [`crate::SystemAdapter`].
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The system cannot be reached. Aborts the current pass for this system.
    #[error("{system} is unavailable: {source}")]
    Unavailable {
        system: System,
        #[source]
        source: ServiceError,
    },

    /// The system refused one request; the entity is skipped.
    #[error("{system} rejected the request: {source}")]
    Rejected {
        system: System,
        #[source]
        source: ServiceError,
    },

    #[error("{kind} creation is disabled on {system} ('{name}')")]
    CreationDisabled {
        system: System,
        kind: EntityKind,
        name: String,
    },

    #[error("{system} project template '{template}' does not exist")]
    TemplateMissing { system: System, template: String },

    #[error("{system} refused to create user '{name}'; check the licence limit")]
    QuotaExceeded { system: System, name: String },

    #[error("{system} has no {field} matching '{wanted}'")]
    VocabularyMismatch {
        system: System,
        field: &'static str,
        wanted: String,
    },

    #[error("{system} {kind} {id} does not exist")]
    NotFound {
        system: System,
        kind: EntityKind,
        id: NativeId,
    },
}

impl AdapterError {
    /// Split a service failure into the pass-fatal and entity-level classes.
    pub fn from_service(system: System, source: ServiceError) -> Self {
        if source.is_connectivity() {
            AdapterError::Unavailable { system, source }
        } else {
            AdapterError::Rejected { system, source }
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, AdapterError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_unavailable() {
        let err = AdapterError::from_service(
            System::Gemini,
            ServiceError::Status { code: 503, body: String::new() },
        );
        assert!(err.is_unavailable());
    }

    #[test]
    fn client_errors_are_entity_level() {
        let err = AdapterError::from_service(
            System::PureCm,
            ServiceError::Status { code: 422, body: "bad name".into() },
        );
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("PureCM"));
    }

    #[test]
    fn undecodable_payloads_are_entity_level() {
        let err = AdapterError::from_service(
            System::Gemini,
            ServiceError::Decode("expected u64 at line 1".into()),
        );
        assert!(!err.is_unavailable());
        assert!(matches!(err, AdapterError::Rejected { .. }));
    }
}
