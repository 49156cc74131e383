//! The capability set every system implements.
//!
//! Calls are blocking. The daemon runs whole passes on a blocking worker, so
//! adapters never need to be `Sync`, only `Send`.

use chrono::{DateTime, Utc};

use tasklink_core::{NativeId, PriorityScale, System, TaskState};

use crate::error::AdapterResult;
use crate::model::{ChangeSubmission, NewTask, Project, Task, User, Version};

pub trait ProjectStore {
    fn list_projects(&self) -> AdapterResult<Vec<Project>>;

    fn get_project(&self, id: NativeId) -> AdapterResult<Option<Project>>;

    /// Exact-name lookup used to adopt an existing project instead of creating one.
    fn find_project_by_name(&self, name: &str) -> AdapterResult<Option<Project>>;

    /// Create a project shaped after `template` (a project of the other system).
    ///
    /// # Errors
    ///
    /// `CreationDisabled` when project creation is off, `TemplateMissing`
    /// when the configured template project cannot be found.
    fn create_project(&self, template: &Project) -> AdapterResult<Project>;
}

pub trait VersionStore {
    fn list_versions(&self, project: NativeId) -> AdapterResult<Vec<Version>>;

    fn get_version(&self, project: NativeId, id: NativeId) -> AdapterResult<Option<Version>>;

    fn create_version(
        &self,
        project: NativeId,
        name: &str,
        description: &str,
        parent: Option<NativeId>,
    ) -> AdapterResult<Version>;
}

pub trait TaskStore {
    /// Tasks of `project` modified strictly after `since`, closed ones included.
    fn recent_tasks(&self, project: NativeId, since: DateTime<Utc>) -> AdapterResult<Vec<Task>>;

    fn get_task(&self, id: NativeId) -> AdapterResult<Option<Task>>;

    fn create_task(&self, project: NativeId, fields: &NewTask) -> AdapterResult<Task>;

    fn set_name(&self, id: NativeId, name: &str) -> AdapterResult<()>;
    fn set_description(&self, id: NativeId, description: &str) -> AdapterResult<()>;
    fn set_owner(&self, id: NativeId, owner: Option<NativeId>) -> AdapterResult<()>;
    fn set_version(&self, id: NativeId, version: Option<NativeId>) -> AdapterResult<()>;
    fn set_parent(&self, id: NativeId, parent: Option<NativeId>) -> AdapterResult<()>;

    /// # Errors
    ///
    /// `VocabularyMismatch` when no native status represents `state`.
    fn set_state(&self, id: NativeId, state: TaskState) -> AdapterResult<()>;

    /// `priority` is canonical; out-of-range values clamp.
    fn set_priority(&self, id: NativeId, priority: u16) -> AdapterResult<()>;

    fn set_url(&self, id: NativeId, url: &str) -> AdapterResult<()>;

    fn priority_scale(&self, project: NativeId) -> AdapterResult<PriorityScale>;

    /// Record a submitted change against a task. Systems that have no place
    /// for commit metadata accept and ignore it.
    fn attach_change(&self, _id: NativeId, _change: &ChangeSubmission) -> AdapterResult<()> {
        Ok(())
    }
}

pub trait UserStore {
    fn get_user(&self, id: NativeId) -> AdapterResult<Option<User>>;

    fn find_user_by_name(&self, name: &str) -> AdapterResult<Option<User>>;

    /// # Errors
    ///
    /// `QuotaExceeded` when the system refuses another account.
    fn create_user(&self, name: &str, email: &str, description: &str) -> AdapterResult<User>;
}

/// Everything the reconciler needs from one side of a sync pair.
pub trait SystemAdapter: ProjectStore + VersionStore + TaskStore + UserStore + Send {
    fn system(&self) -> System;
}

/// Description used when creating a mirror: falls back to the name.
pub fn description_or_name<'a>(description: &'a str, name: &'a str) -> &'a str {
    if description.trim().is_empty() {
        name
    } else {
        description
    }
}
