//! PureCM task ledger adapter.
//!
//! PureCM states line up with the canonical ones one to one; priorities run
//! from 1 (highest) to the configured level count.

mod http;
mod service;

pub use http::HttpPureCmService;
pub use service::{PcmProject, PcmState, PcmTask, PcmUser, PcmVersion, PureCmService};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use tasklink_core::{EntityKind, NativeId, Options, PriorityScale, System, TaskState};

use crate::adapter::{
    description_or_name, ProjectStore, SystemAdapter, TaskStore, UserStore, VersionStore,
};
use crate::error::{AdapterError, AdapterResult, ServiceError};
use crate::model::{NewTask, Project, Task, User, Version};

const SYSTEM: System = System::PureCm;

fn purecm_err(err: ServiceError) -> AdapterError {
    AdapterError::from_service(SYSTEM, err)
}

pub struct PureCmAdapter<S> {
    service: S,
    scale: PriorityScale,
    project_creation: bool,
    task_creation: bool,
    options: Options,
}

impl<S: PureCmService> PureCmAdapter<S> {
    pub fn new(service: S, options: &Options) -> Self {
        Self {
            service,
            scale: PriorityScale::ascending(options.purecm.priority_levels),
            project_creation: options.purecm.project_creation,
            task_creation: options.purecm.task_creation,
            options: options.clone(),
        }
    }

    fn to_project(&self, p: PcmProject) -> Project {
        let includable = !p.archived && !self.options.is_project_excluded(&p.name);
        Project {
            id: NativeId(p.id),
            name: p.name,
            description: p.description,
            archived: p.archived,
            includable,
        }
    }

    fn to_user(&self, u: PcmUser) -> User {
        let includable = !self.options.is_user_excluded(&u.name);
        User {
            id: NativeId(u.id),
            name: u.name,
            email: u.email,
            description: u.description,
            includable,
        }
    }

    fn project_includable(&self, project_id: u64) -> AdapterResult<bool> {
        Ok(self
            .service
            .projects()
            .map_err(purecm_err)?
            .into_iter()
            .find(|p| p.id == project_id)
            .is_some_and(|p| self.to_project(p).includable))
    }

    fn to_task(&self, t: PcmTask, project_includable: bool) -> AdapterResult<Task> {
        let owner_excluded = match t.owner_id {
            Some(id) => self
                .service
                .user(id)
                .map_err(purecm_err)?
                .is_some_and(|u| !self.to_user(u).includable),
            None => false,
        };
        Ok(Task {
            id: NativeId(t.id),
            project: NativeId(t.project_id),
            name: t.name,
            description: t.description,
            owner: t.owner_id.map(NativeId),
            version: t.version_id.map(NativeId),
            parent: t.parent_id.map(NativeId),
            priority: self.scale.to_canonical(t.priority),
            state: canonical_state(t.state),
            modified: t.modified,
            url: t.url,
            is_feature: t.is_feature,
            includable: project_includable && !owner_excluded,
        })
    }

    fn modify(&self, id: NativeId, edit: impl FnOnce(&mut PcmTask)) -> AdapterResult<()> {
        let mut task = self
            .service
            .task(id.0)
            .map_err(purecm_err)?
            .ok_or(AdapterError::NotFound {
                system: SYSTEM,
                kind: EntityKind::Task,
                id,
            })?;
        edit(&mut task);
        self.service.update_task(&task).map_err(purecm_err)?;
        Ok(())
    }
}

fn canonical_state(state: PcmState) -> TaskState {
    match state {
        PcmState::Open => TaskState::Open,
        PcmState::Completed => TaskState::Completed,
        PcmState::Closed => TaskState::Closed,
        PcmState::Rejected => TaskState::Rejected,
    }
}

fn native_state(state: TaskState) -> AdapterResult<PcmState> {
    match state {
        TaskState::Open => Ok(PcmState::Open),
        TaskState::Completed => Ok(PcmState::Completed),
        TaskState::Closed => Ok(PcmState::Closed),
        TaskState::Rejected => Ok(PcmState::Rejected),
        TaskState::Unknown => Err(AdapterError::VocabularyMismatch {
            system: SYSTEM,
            field: "state",
            wanted: state.to_string(),
        }),
    }
}

impl<S: PureCmService> ProjectStore for PureCmAdapter<S> {
    fn list_projects(&self) -> AdapterResult<Vec<Project>> {
        let projects = self.service.projects().map_err(purecm_err)?;
        Ok(projects.into_iter().map(|p| self.to_project(p)).collect())
    }

    fn get_project(&self, id: NativeId) -> AdapterResult<Option<Project>> {
        Ok(self.list_projects()?.into_iter().find(|p| p.id == id))
    }

    fn find_project_by_name(&self, name: &str) -> AdapterResult<Option<Project>> {
        Ok(self.list_projects()?.into_iter().find(|p| p.name == name))
    }

    fn create_project(&self, template: &Project) -> AdapterResult<Project> {
        if !self.project_creation {
            return Err(AdapterError::CreationDisabled {
                system: SYSTEM,
                kind: EntityKind::Project,
                name: template.name.clone(),
            });
        }
        let project = PcmProject {
            id: 0,
            name: template.name.clone(),
            description: description_or_name(&template.description, &template.name).to_owned(),
            archived: false,
        };
        let created = self.service.create_project(&project).map_err(purecm_err)?;
        info!(system = %SYSTEM, project = %created.name, id = created.id, "created project");
        Ok(self.to_project(created))
    }
}

impl<S: PureCmService> VersionStore for PureCmAdapter<S> {
    fn list_versions(&self, project: NativeId) -> AdapterResult<Vec<Version>> {
        let versions = self.service.versions(project.0).map_err(purecm_err)?;
        Ok(versions
            .into_iter()
            .map(|v| Version {
                id: NativeId(v.id),
                project: NativeId(v.project_id),
                name: v.name,
                description: v.description,
                parent: v.parent_id.map(NativeId),
            })
            .collect())
    }

    fn get_version(&self, project: NativeId, id: NativeId) -> AdapterResult<Option<Version>> {
        Ok(self.list_versions(project)?.into_iter().find(|v| v.id == id))
    }

    fn create_version(
        &self,
        project: NativeId,
        name: &str,
        description: &str,
        parent: Option<NativeId>,
    ) -> AdapterResult<Version> {
        let version = PcmVersion {
            id: 0,
            project_id: project.0,
            name: name.to_owned(),
            description: description_or_name(description, name).to_owned(),
            parent_id: parent.map(|p| p.0),
        };
        let created = self.service.create_version(&version).map_err(purecm_err)?;
        info!(system = %SYSTEM, project = %project, version = %created.name, id = created.id, "created version");
        Ok(Version {
            id: NativeId(created.id),
            project: NativeId(created.project_id),
            name: created.name,
            description: created.description,
            parent: created.parent_id.map(NativeId),
        })
    }
}

impl<S: PureCmService> TaskStore for PureCmAdapter<S> {
    fn recent_tasks(&self, project: NativeId, since: DateTime<Utc>) -> AdapterResult<Vec<Task>> {
        let includable = self.project_includable(project.0)?;
        let changed = self
            .service
            .tasks_changed_since(project.0, since)
            .map_err(purecm_err)?;
        let tasks = changed
            .into_iter()
            .map(|t| self.to_task(t, includable))
            .collect::<AdapterResult<Vec<_>>>()?;
        debug!(system = %SYSTEM, project = %project, count = tasks.len(), "recent tasks");
        Ok(tasks)
    }

    fn get_task(&self, id: NativeId) -> AdapterResult<Option<Task>> {
        match self.service.task(id.0).map_err(purecm_err)? {
            Some(t) => {
                let includable = self.project_includable(t.project_id)?;
                self.to_task(t, includable).map(Some)
            }
            None => Ok(None),
        }
    }

    fn create_task(&self, project: NativeId, fields: &NewTask) -> AdapterResult<Task> {
        if !self.task_creation {
            return Err(AdapterError::CreationDisabled {
                system: SYSTEM,
                kind: EntityKind::Task,
                name: fields.name.clone(),
            });
        }
        let task = PcmTask {
            id: 0,
            project_id: project.0,
            name: fields.name.clone(),
            description: fields.description.clone(),
            owner_id: fields.owner.map(|o| o.0),
            version_id: fields.version.map(|v| v.0),
            parent_id: fields.parent.map(|p| p.0),
            priority: self.scale.from_canonical(fields.priority),
            state: native_state(fields.state).unwrap_or(PcmState::Open),
            is_feature: fields.is_feature,
            url: fields.url.clone(),
            modified: Utc::now(),
        };
        let created = self.service.create_task(&task).map_err(purecm_err)?;
        info!(system = %SYSTEM, project = %project, task = %created.name, id = created.id, "created task");
        let includable = self.project_includable(project.0)?;
        self.to_task(created, includable)
    }

    fn set_name(&self, id: NativeId, name: &str) -> AdapterResult<()> {
        self.modify(id, |t| t.name = name.to_owned())
    }

    fn set_description(&self, id: NativeId, description: &str) -> AdapterResult<()> {
        self.modify(id, |t| t.description = description.to_owned())
    }

    fn set_owner(&self, id: NativeId, owner: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |t| t.owner_id = owner.map(|o| o.0))
    }

    fn set_version(&self, id: NativeId, version: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |t| t.version_id = version.map(|v| v.0))
    }

    fn set_parent(&self, id: NativeId, parent: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |t| t.parent_id = parent.map(|p| p.0))
    }

    fn set_state(&self, id: NativeId, state: TaskState) -> AdapterResult<()> {
        let native = native_state(state)?;
        self.modify(id, |t| t.state = native)
    }

    fn set_priority(&self, id: NativeId, priority: u16) -> AdapterResult<()> {
        let native = self.scale.from_canonical(priority);
        self.modify(id, |t| t.priority = native)
    }

    fn set_url(&self, id: NativeId, url: &str) -> AdapterResult<()> {
        self.modify(id, |t| t.url = url.to_owned())
    }

    fn priority_scale(&self, _project: NativeId) -> AdapterResult<PriorityScale> {
        Ok(self.scale)
    }
}

impl<S: PureCmService> UserStore for PureCmAdapter<S> {
    fn get_user(&self, id: NativeId) -> AdapterResult<Option<User>> {
        let user = self.service.user(id.0).map_err(purecm_err)?;
        Ok(user.map(|u| self.to_user(u)))
    }

    fn find_user_by_name(&self, name: &str) -> AdapterResult<Option<User>> {
        let users = self.service.users().map_err(purecm_err)?;
        Ok(users
            .into_iter()
            .find(|u| u.name == name)
            .map(|u| self.to_user(u)))
    }

    fn create_user(&self, name: &str, email: &str, description: &str) -> AdapterResult<User> {
        let user = PcmUser {
            id: 0,
            name: name.to_owned(),
            email: email.to_owned(),
            description: description.to_owned(),
        };
        match self.service.create_user(&user) {
            Ok(created) => {
                info!(system = %SYSTEM, user = %created.name, id = created.id, "created user");
                Ok(self.to_user(created))
            }
            Err(ServiceError::Rejected(_)) => Err(AdapterError::QuotaExceeded {
                system: SYSTEM,
                name: name.to_owned(),
            }),
            Err(e) => Err(purecm_err(e)),
        }
    }
}

impl<S: PureCmService> SystemAdapter for PureCmAdapter<S> {
    fn system(&self) -> System {
        SYSTEM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPureCm;

    #[test]
    fn unknown_state_is_a_vocabulary_mismatch() {
        let pcm = MemoryPureCm::new();
        let project = pcm.add_project("Web");
        let task = pcm.add_task(project, "crash");
        let adapter = PureCmAdapter::new(pcm.clone(), &Options::default());

        let err = adapter.set_state(task, TaskState::Unknown).unwrap_err();
        assert!(matches!(err, AdapterError::VocabularyMismatch { .. }), "got: {err}");
        assert_eq!(pcm.task_snapshot(task).unwrap().state, PcmState::Open);
    }

    #[test]
    fn setters_are_visible_to_get_task() {
        let pcm = MemoryPureCm::new();
        let project = pcm.add_project("Web");
        let task = pcm.add_task(project, "crash");
        let adapter = PureCmAdapter::new(pcm, &Options::default());

        adapter.set_priority(task, 9).unwrap();
        adapter.set_state(task, TaskState::Rejected).unwrap();
        adapter.set_url(task, "https://gemini/Default.aspx?id=3").unwrap();

        let read = adapter.get_task(task).unwrap().unwrap();
        assert_eq!(read.priority, 5);
        assert_eq!(read.state, TaskState::Rejected);
        assert_eq!(read.url, "https://gemini/Default.aspx?id=3");
    }

    #[test]
    fn exclusion_lists_mark_projects_users_and_tasks() {
        let mut options = Options::default();
        options.excluded_projects.push("Sandbox".into());
        options.excluded_users.push("build".into());
        let pcm = MemoryPureCm::new();
        let web = pcm.add_project("Web");
        let sandbox = pcm.add_project("Sandbox");
        let build = pcm.add_user("build");
        let alice = pcm.add_user("alice");
        let owned_by_build = pcm.add_task(web, "nightly");
        pcm.edit_task(owned_by_build, |t| t.owner_id = Some(build.0));
        let owned_by_alice = pcm.add_task(web, "crash");
        pcm.edit_task(owned_by_alice, |t| t.owner_id = Some(alice.0));
        let in_sandbox = pcm.add_task(sandbox, "spike");
        let adapter = PureCmAdapter::new(pcm, &options);

        assert!(adapter.get_project(web).unwrap().unwrap().includable);
        assert!(!adapter.get_project(sandbox).unwrap().unwrap().includable);
        assert!(!adapter.get_user(build).unwrap().unwrap().includable);
        assert!(adapter.get_user(alice).unwrap().unwrap().includable);
        assert!(!adapter.get_task(owned_by_build).unwrap().unwrap().includable);
        assert!(adapter.get_task(owned_by_alice).unwrap().unwrap().includable);
        assert!(!adapter.get_task(in_sandbox).unwrap().unwrap().includable);
    }

    #[test]
    fn creation_toggle_is_honoured() {
        let mut options = Options::default();
        options.purecm.task_creation = false;
        let pcm = MemoryPureCm::new();
        let project = pcm.add_project("Web");
        let adapter = PureCmAdapter::new(pcm.clone(), &options);

        let err = adapter.create_task(project, &NewTask::default()).unwrap_err();
        assert!(matches!(err, AdapterError::CreationDisabled { .. }), "got: {err}");
        assert_eq!(pcm.write_count(), 0);
    }
}
