//! Canonical entities as seen through an adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tasklink_core::{NativeId, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: NativeId,
    pub name: String,
    pub description: String,
    pub archived: bool,
    /// Not archived and not excluded by configuration.
    pub includable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: NativeId,
    pub project: NativeId,
    pub name: String,
    pub description: String,
    pub parent: Option<NativeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: NativeId,
    pub project: NativeId,
    pub name: String,
    pub description: String,
    pub owner: Option<NativeId>,
    pub version: Option<NativeId>,
    pub parent: Option<NativeId>,
    /// Canonical ordinal, 1 is the highest priority.
    pub priority: u16,
    pub state: TaskState,
    pub modified: DateTime<Utc>,
    pub url: String,
    pub is_feature: bool,
    /// Project includable and owner not excluded.
    pub includable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: NativeId,
    pub name: String,
    pub email: String,
    pub description: String,
    pub includable: bool,
}

/// Field values for a task about to be created. References are already
/// resolved to ids of the system the task is created on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub owner: Option<NativeId>,
    pub version: Option<NativeId>,
    pub parent: Option<NativeId>,
    pub priority: u16,
    pub state: TaskState,
    pub is_feature: bool,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Submitted changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Edited,
    Renamed,
    Deleted,
}

/// One file touched by a submitted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub kind: ChangeKind,
    pub path: String,
    /// New path for `Renamed` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
}

impl ChangeItem {
    /// Path the item lives at after the change.
    pub fn current_path(&self) -> &str {
        self.renamed_to.as_deref().unwrap_or(&self.path)
    }

    pub fn describe(&self) -> String {
        match self.kind {
            ChangeKind::Added => format!("Added '{}'", self.path),
            ChangeKind::Edited => format!("Edited '{}'", self.path),
            ChangeKind::Deleted => format!("Deleted '{}'", self.path),
            ChangeKind::Renamed => format!("Renamed '{}' to '{}'", self.path, self.current_path()),
        }
    }
}

/// A change committed on the version-control side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSubmission {
    pub change_id: u64,
    pub client: String,
    #[serde(default)]
    pub description: String,
    /// Stream the change was submitted to.
    #[serde(default)]
    pub stream: String,
    #[serde(default)]
    pub items: Vec<ChangeItem>,
    /// PureCM task ids the change is associated with.
    #[serde(default)]
    pub linked_tasks: Vec<NativeId>,
}

impl ChangeSubmission {
    /// Plain-text summary posted as a tracker comment, one line per item.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Change '{}' submitted by '{}'.", self.change_id, self.client),
            String::new(),
            "Description:".to_owned(),
            self.description.clone(),
            String::new(),
            "Change Items:".to_owned(),
        ];
        lines.extend(self.items.iter().map(ChangeItem::describe));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renamed_item_describes_both_paths() {
        let item = ChangeItem {
            kind: ChangeKind::Renamed,
            path: "/main/a.rs".into(),
            renamed_to: Some("/main/b.rs".into()),
        };
        assert_eq!(item.describe(), "Renamed '/main/a.rs' to '/main/b.rs'");
        assert_eq!(item.current_path(), "/main/b.rs");
    }

    #[test]
    fn summary_lists_every_item() {
        let change = ChangeSubmission {
            change_id: 42,
            client: "alice-ws".into(),
            description: "fix crash".into(),
            stream: "/main".into(),
            items: vec![
                ChangeItem { kind: ChangeKind::Added, path: "x".into(), renamed_to: None },
                ChangeItem { kind: ChangeKind::Deleted, path: "y".into(), renamed_to: None },
            ],
            linked_tasks: vec![NativeId(7)],
        };
        let lines = change.summary_lines();
        assert_eq!(lines[0], "Change '42' submitted by 'alice-ws'.");
        assert!(lines.contains(&"Added 'x'".to_owned()));
        assert!(lines.contains(&"Deleted 'y'".to_owned()));
    }
}
