//! Translation between native vocabularies and the canonical one.
//!
//! Priorities live on a canonical ordinal scale where `1` is the highest
//! priority. Each system exposes a [`PriorityScale`] describing how many
//! native levels it has and in which direction they run.

use serde::{Deserialize, Serialize};

use crate::types::{NativeId, TaskState};

/// Canonical priority used when a native priority cannot be resolved.
pub const DEFAULT_PRIORITY: u16 = 3;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    /// Native level 1 is the highest priority.
    Ascending,
    /// Native level N is the highest priority.
    Descending,
}

/// Native priority scale of one system (or one project of a system).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityScale {
    levels: u16,
    direction: ScaleDirection,
}

impl PriorityScale {
    pub fn new(levels: u16, direction: ScaleDirection) -> Self {
        Self {
            levels: levels.max(1),
            direction,
        }
    }

    pub fn ascending(levels: u16) -> Self {
        Self::new(levels, ScaleDirection::Ascending)
    }

    pub fn descending(levels: u16) -> Self {
        Self::new(levels, ScaleDirection::Descending)
    }

    pub fn levels(&self) -> u16 {
        self.levels
    }

    pub fn direction(&self) -> ScaleDirection {
        self.direction
    }

    /// Clamp an ordinal into `1..=levels`.
    pub fn clamp(&self, ordinal: u16) -> u16 {
        ordinal.clamp(1, self.levels)
    }

    /// Native level to canonical ordinal.
    pub fn to_canonical(&self, native: u16) -> u16 {
        let native = self.clamp(native);
        match self.direction {
            ScaleDirection::Ascending => native,
            ScaleDirection::Descending => self.levels - native + 1,
        }
    }

    /// Canonical ordinal to native level. Values past either end clamp.
    pub fn from_canonical(&self, ordinal: u16) -> u16 {
        let ordinal = self.clamp(ordinal);
        match self.direction {
            ScaleDirection::Ascending => ordinal,
            ScaleDirection::Descending => self.levels - ordinal + 1,
        }
    }

    /// Whether a mirror at canonical `current` must be written to reach
    /// `desired`. A desired value outside this scale compares equal to its
    /// clamped value, so a 5-level source never keeps rewriting a 3-level
    /// target.
    pub fn needs_update(&self, current: u16, desired: u16) -> bool {
        current != self.clamp(desired)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// One native status (Gemini resolution, PureCM state) in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDefinition {
    pub id: NativeId,
    pub name: String,
    pub is_final: bool,
}

/// Pick the native status that represents `state`.
///
/// `Open` maps to the first non-final definition; every terminal state maps
/// to the last final one. `Unknown` and empty vocabularies map to nothing.
pub fn native_status_for(
    definitions: &[StatusDefinition],
    state: TaskState,
) -> Option<&StatusDefinition> {
    match state {
        TaskState::Open => definitions.iter().find(|d| !d.is_final),
        s if s.is_terminal() => definitions.iter().rev().find(|d| d.is_final),
        _ => None,
    }
}

/// Canonical state of a task whose native status is `definition`.
///
/// A missing or unmatched status reads as `Closed`: only a known non-final
/// status counts as open work.
pub fn canonical_state_for(definition: Option<&StatusDefinition>) -> TaskState {
    match definition {
        Some(d) if !d.is_final => TaskState::Open,
        _ => TaskState::Closed,
    }
}
