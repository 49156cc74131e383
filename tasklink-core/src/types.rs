//! Domain types shared by every tasklink crate.
//!
//! Native ids are opaque per system; the pair `(System, EntityKind, NativeId)`
//! is what the identity map keys on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of an entity inside one external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeId(pub u64);

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for NativeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for NativeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One of the two record stores kept in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum System {
    Gemini,
    PureCm,
}

impl System {
    pub const ALL: [System; 2] = [System::Gemini, System::PureCm];

    /// The opposite system of a sync pair.
    pub fn peer(self) -> System {
        match self {
            System::Gemini => System::PureCm,
            System::PureCm => System::Gemini,
        }
    }

    /// Stable lowercase key used in files and on the wire.
    pub fn key(self) -> &'static str {
        match self {
            System::Gemini => "gemini",
            System::PureCm => "purecm",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            System::Gemini => write!(f, "Gemini"),
            System::PureCm => write!(f, "PureCM"),
        }
    }
}

impl FromStr for System {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(System::Gemini),
            "purecm" | "pcm" => Ok(System::PureCm),
            other => Err(format!("unknown system '{other}' (expected gemini or purecm)")),
        }
    }
}

/// Entity kinds that can be linked across systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Version,
    Task,
    User,
}

impl EntityKind {
    pub fn key(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Version => "version",
            EntityKind::Task => "task",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Canonical task state. `Completed`, `Closed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Open,
    Completed,
    Closed,
    Rejected,
    #[default]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Closed | TaskState::Rejected
        )
    }

    /// Whether a mirror currently in `self` has to be moved to `desired`.
    ///
    /// Only open/closed differences are pushed: two distinct terminal states
    /// compare equal.
    pub fn needs_update(self, desired: TaskState) -> bool {
        if self == desired {
            return false;
        }
        self == TaskState::Open || desired == TaskState::Open
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Open => write!(f, "open"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Closed => write!(f, "closed"),
            TaskState::Rejected => write!(f, "rejected"),
            TaskState::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_is_an_involution() {
        for system in System::ALL {
            assert_eq!(system.peer().peer(), system);
            assert_ne!(system.peer(), system);
        }
    }

    #[test]
    fn system_parses_case_insensitively() {
        assert_eq!("GEMINI".parse::<System>(), Ok(System::Gemini));
        assert_eq!(" PureCM ".parse::<System>(), Ok(System::PureCm));
        assert!("jira".parse::<System>().is_err());
    }

    #[test]
    fn terminal_states_compare_equal() {
        assert!(!TaskState::Completed.needs_update(TaskState::Rejected));
        assert!(!TaskState::Closed.needs_update(TaskState::Completed));
        assert!(TaskState::Closed.needs_update(TaskState::Open));
        assert!(TaskState::Open.needs_update(TaskState::Rejected));
        assert!(!TaskState::Open.needs_update(TaskState::Open));
    }

    #[test]
    fn system_serializes_lowercase() {
        assert_eq!(serde_yaml::to_string(&System::PureCm).unwrap().trim(), "purecm");
    }
}
