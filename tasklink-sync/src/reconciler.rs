//! Reconciler: makes the target system hold a consistent counterpart of a
//! source entity.
//!
//! Projects, versions and users follow the same shape: existing link, then
//! exact-name match on the target, then creation. Tasks additionally resolve
//! their owner, version and parent (recursively, lazily) and on the update
//! path compare field by field so that a pass over consistent data writes
//! nothing.
//!
//! A failed field write is logged and the remaining fields still sync; only
//! an unavailable adapter aborts the task.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use tasklink_adapters::adapter::description_or_name;
use tasklink_adapters::{AdapterError, AdapterResult, NewTask, Project, SystemAdapter, Task, User, Version};
use tasklink_core::{Checkpoint, EntityKind, NativeId, System};

use crate::error::SyncError;
use crate::identity::IdentityMap;

/// Task fields compared on the update path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskField {
    Name,
    Description,
    Owner,
    Version,
    Parent,
    Priority,
    State,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Created { peer: NativeId },
    Updated { peer: NativeId, fields: Vec<TaskField> },
    Unchanged { peer: NativeId },
}

impl TaskOutcome {
    pub fn peer(&self) -> NativeId {
        match self {
            TaskOutcome::Created { peer }
            | TaskOutcome::Updated { peer, .. }
            | TaskOutcome::Unchanged { peer } => *peer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Write the mirror's URL back onto a freshly mirrored source task.
    pub update_url: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { update_url: true }
    }
}

pub struct Reconciler<'a> {
    source: &'a dyn SystemAdapter,
    target: &'a dyn SystemAdapter,
    links: &'a mut dyn IdentityMap,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: &'a dyn SystemAdapter,
        target: &'a dyn SystemAdapter,
        links: &'a mut dyn IdentityMap,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            source,
            target,
            links,
            options,
        }
    }

    fn source_system(&self) -> System {
        self.source.system()
    }

    // -----------------------------------------------------------------------
    // Projects, versions, users
    // -----------------------------------------------------------------------

    /// Counterpart of a source project on the target.
    pub fn reconcile_project(&mut self, project: &Project) -> Result<Project, SyncError> {
        let system = self.source_system();
        if let Some(peer) = self.links.get(system, EntityKind::Project, project.id) {
            return self.target.get_project(peer.id)?.ok_or_else(|| {
                dangling(EntityKind::Project, &project.name, project.id, self.target.system(), peer.id)
            });
        }
        if !project.includable {
            return Err(SyncError::NotIncluded {
                kind: EntityKind::Project,
                name: project.name.clone(),
                id: project.id,
            });
        }

        let mirror = match self.target.find_project_by_name(&project.name)? {
            Some(existing) => {
                info!(system = %system, project = %project.name, peer = %existing.id, "matched project by name");
                existing
            }
            None => {
                let template = Project {
                    description: description_or_name(&project.description, &project.name).to_owned(),
                    ..project.clone()
                };
                self.target.create_project(&template)?
            }
        };
        self.links.set(system, EntityKind::Project, project.id, mirror.id)?;
        Ok(mirror)
    }

    /// Counterpart of a source version, creating missing parent versions first.
    pub fn reconcile_version(&mut self, version: &Version) -> Result<Version, SyncError> {
        self.reconcile_version_inner(version, &mut HashSet::new())
    }

    fn reconcile_version_inner(
        &mut self,
        version: &Version,
        visited: &mut HashSet<NativeId>,
    ) -> Result<Version, SyncError> {
        let system = self.source_system();
        let target_project = self.resolve_project(version.project)?;

        if let Some(peer) = self.links.get(system, EntityKind::Version, version.id) {
            return self
                .target
                .get_version(target_project.id, peer.id)?
                .ok_or_else(|| {
                    dangling(EntityKind::Version, &version.name, version.id, self.target.system(), peer.id)
                });
        }
        if !visited.insert(version.id) {
            return Err(SyncError::unresolvable(
                EntityKind::Version,
                &version.name,
                version.id,
                "parent version cycle",
            ));
        }

        let existing = self
            .target
            .list_versions(target_project.id)?
            .into_iter()
            .find(|v| v.name == version.name);
        let mirror = match existing {
            Some(existing) => existing,
            None => {
                let parent = self.resolve_parent_version(version, visited)?;
                self.target.create_version(
                    target_project.id,
                    &version.name,
                    description_or_name(&version.description, &version.name),
                    parent,
                )?
            }
        };
        self.links.set(system, EntityKind::Version, version.id, mirror.id)?;
        Ok(mirror)
    }

    /// A parent that cannot be mirrored leaves the version at the root.
    fn resolve_parent_version(
        &mut self,
        version: &Version,
        visited: &mut HashSet<NativeId>,
    ) -> Result<Option<NativeId>, SyncError> {
        let Some(parent_id) = version.parent else {
            return Ok(None);
        };
        let parent = match self.source.get_version(version.project, parent_id)? {
            Some(parent) => parent,
            None => {
                warn!(version = %version.name, parent = %parent_id, "parent version not found; creating without parent");
                return Ok(None);
            }
        };
        match self.reconcile_version_inner(&parent, visited) {
            Ok(mirror) => Ok(Some(mirror.id)),
            Err(e) if e.is_pass_fatal() => Err(e),
            Err(e) => {
                warn!(version = %version.name, error = %e, "failed to mirror parent version; creating without parent");
                Ok(None)
            }
        }
    }

    /// Counterpart of a source user. A refused account is logged here and
    /// surfaces as an entity-level error.
    pub fn reconcile_user(&mut self, user: &User) -> Result<User, SyncError> {
        let system = self.source_system();
        if let Some(peer) = self.links.get(system, EntityKind::User, user.id) {
            return self.target.get_user(peer.id)?.ok_or_else(|| {
                dangling(EntityKind::User, &user.name, user.id, self.target.system(), peer.id)
            });
        }
        if !user.includable {
            return Err(SyncError::NotIncluded {
                kind: EntityKind::User,
                name: user.name.clone(),
                id: user.id,
            });
        }

        let mirror = match self.target.find_user_by_name(&user.name)? {
            Some(existing) => existing,
            None => match self.target.create_user(&user.name, &user.email, &user.description) {
                Ok(created) => created,
                Err(e @ AdapterError::QuotaExceeded { .. }) => {
                    warn!(user = %user.name, id = %user.id, error = %e, "user not created");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            },
        };
        self.links.set(system, EntityKind::User, user.id, mirror.id)?;
        Ok(mirror)
    }

    fn resolve_project(&mut self, id: NativeId) -> Result<Project, SyncError> {
        let project = self.source.get_project(id)?.ok_or_else(|| {
            SyncError::unresolvable(EntityKind::Project, "", id, "source project not found")
        })?;
        self.reconcile_project(&project)
    }

    fn resolve_user(&mut self, id: NativeId) -> Result<User, SyncError> {
        let user = self
            .source
            .get_user(id)?
            .ok_or_else(|| SyncError::unresolvable(EntityKind::User, "", id, "source user not found"))?;
        self.reconcile_user(&user)
    }

    fn resolve_version(&mut self, project: NativeId, id: NativeId) -> Result<Version, SyncError> {
        let version = self.source.get_version(project, id)?.ok_or_else(|| {
            SyncError::unresolvable(EntityKind::Version, "", id, "source version not found")
        })?;
        self.reconcile_version(&version)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Create or update the counterpart of a changed source task.
    pub fn reconcile_task(&mut self, task: &Task) -> Result<TaskOutcome, SyncError> {
        self.reconcile_task_inner(task, &mut HashSet::new())
    }

    fn reconcile_task_inner(
        &mut self,
        task: &Task,
        visited: &mut HashSet<NativeId>,
    ) -> Result<TaskOutcome, SyncError> {
        let system = self.source_system();
        let link = self.links.get(system, EntityKind::Task, task.id);
        // Checked before the project is resolved so an excluded task never
        // causes a project to be created.
        if link.is_none() && !task.includable {
            return Err(SyncError::NotIncluded {
                kind: EntityKind::Task,
                name: task.name.clone(),
                id: task.id,
            });
        }
        if !visited.insert(task.id) {
            return Err(SyncError::unresolvable(
                EntityKind::Task,
                &task.name,
                task.id,
                "parent task cycle",
            ));
        }

        if link.is_none() && (task.owner.is_none() || task.version.is_none()) {
            return Err(missing_field(task));
        }

        let target_project = self.resolve_project(task.project)?;
        match link {
            None => self.create_mirror(task, &target_project, visited),
            Some(peer) => self.update_mirror(task, peer.id, visited),
        }
    }

    fn create_mirror(
        &mut self,
        task: &Task,
        target_project: &Project,
        visited: &mut HashSet<NativeId>,
    ) -> Result<TaskOutcome, SyncError> {
        let (Some(owner_id), Some(version_id)) = (task.owner, task.version) else {
            return Err(missing_field(task));
        };

        let owner = self.resolve_user(owner_id)?;
        let version = self.resolve_version(task.project, version_id)?;
        let parent = match task.parent {
            Some(parent_id) => Some(self.resolve_parent_task(parent_id, visited)?),
            None => None,
        };

        let fields = NewTask {
            name: task.name.clone(),
            description: task.description.clone(),
            owner: Some(owner.id),
            version: Some(version.id),
            parent,
            priority: task.priority,
            state: task.state,
            is_feature: task.is_feature,
            url: task.url.clone(),
        };
        let created = self.target.create_task(target_project.id, &fields)?;
        let system = self.source_system();
        self.links.set(system, EntityKind::Task, task.id, created.id)?;
        info!(
            system = %system,
            task = %task.name,
            id = %task.id,
            peer = %created.id,
            "mirrored new task"
        );

        if self.options.update_url && !created.url.is_empty() && created.url != task.url {
            self.apply(task, "url", self.source.set_url(task.id, &created.url))?;
        }

        // Creation takes only what the target accepts up front (a tracker
        // opens new issues in its creation status); converge the rest now.
        self.push_fields(task, &created, visited)?;
        self.complete(task, created.id)?;
        Ok(TaskOutcome::Created { peer: created.id })
    }

    fn update_mirror(
        &mut self,
        task: &Task,
        peer: NativeId,
        visited: &mut HashSet<NativeId>,
    ) -> Result<TaskOutcome, SyncError> {
        let mirror = self.target.get_task(peer)?.ok_or_else(|| {
            dangling(EntityKind::Task, &task.name, task.id, self.target.system(), peer)
        })?;
        let fields = self.push_fields(task, &mirror, visited)?;
        self.complete(task, peer)?;
        if fields.is_empty() {
            debug!(task = %task.name, id = %task.id, "mirror already consistent");
            Ok(TaskOutcome::Unchanged { peer })
        } else {
            info!(task = %task.name, id = %task.id, peer = %peer, fields = ?fields, "updated mirror");
            Ok(TaskOutcome::Updated { peer, fields })
        }
    }

    /// Compare every synced field and write the ones that differ.
    fn push_fields(
        &mut self,
        task: &Task,
        mirror: &Task,
        visited: &mut HashSet<NativeId>,
    ) -> Result<Vec<TaskField>, SyncError> {
        let target = self.target;
        let id = mirror.id;
        let mut changed = Vec::new();

        if task.name != mirror.name && self.apply(task, "name", target.set_name(id, &task.name))? {
            changed.push(TaskField::Name);
        }

        // An empty description is never pushed: creation filled it in from
        // the name and clearing it again would flap.
        if !task.description.is_empty()
            && task.description != mirror.description
            && self.apply(task, "description", target.set_description(id, &task.description))?
        {
            changed.push(TaskField::Description);
        }

        if let Some(owner) = self.mirrored_ref(task, "owner", task.owner, |r, o| {
            r.resolve_user(o).map(|u| u.id)
        })? {
            if owner != mirror.owner && self.apply(task, "owner", target.set_owner(id, owner))? {
                changed.push(TaskField::Owner);
            }
        }

        let project = task.project;
        if let Some(version) = self.mirrored_ref(task, "version", task.version, |r, v| {
            r.resolve_version(project, v).map(|v| v.id)
        })? {
            if version != mirror.version
                && self.apply(task, "version", target.set_version(id, version))?
            {
                changed.push(TaskField::Version);
            }
        }

        let parent = match task.parent {
            None => Some(None),
            Some(parent_id) => match self.resolve_parent_task(parent_id, visited) {
                Ok(peer) => Some(Some(peer)),
                Err(e) if e.is_pass_fatal() => return Err(e),
                Err(e) => {
                    warn!(task = %task.name, id = %task.id, field = "parent", error = %e, "field left unchanged");
                    None
                }
            },
        };
        if let Some(parent) = parent {
            if parent != mirror.parent && self.apply(task, "parent", target.set_parent(id, parent))? {
                changed.push(TaskField::Parent);
            }
        }

        let scales = target
            .priority_scale(mirror.project)
            .and_then(|t| Ok((t, self.source.priority_scale(task.project)?)));
        match scales {
            // Equal when either side's scale clamps the other's value onto
            // its own, so a coarser scale never flattens a finer one.
            Ok((target_scale, source_scale)) => {
                if target_scale.needs_update(mirror.priority, task.priority)
                    && source_scale.needs_update(task.priority, mirror.priority)
                    && self.apply(task, "priority", target.set_priority(id, task.priority))?
                {
                    changed.push(TaskField::Priority);
                }
            }
            Err(e) => {
                self.apply(task, "priority", Err(e))?;
            }
        }

        if mirror.state.needs_update(task.state)
            && self.apply(task, "state", target.set_state(id, task.state))?
        {
            changed.push(TaskField::State);
        }

        Ok(changed)
    }

    /// Mirror id for an optional reference. `Some(None)` clears the field,
    /// `None` means the reference could not be resolved and the field is
    /// left alone.
    fn mirrored_ref(
        &mut self,
        task: &Task,
        field: &'static str,
        reference: Option<NativeId>,
        resolve: impl FnOnce(&mut Self, NativeId) -> Result<NativeId, SyncError>,
    ) -> Result<Option<Option<NativeId>>, SyncError> {
        let Some(source_id) = reference else {
            return Ok(Some(None));
        };
        match resolve(self, source_id) {
            Ok(peer) => Ok(Some(Some(peer))),
            Err(e) if e.is_pass_fatal() => Err(e),
            Err(e) => {
                warn!(task = %task.name, id = %task.id, field, error = %e, "field left unchanged");
                Ok(None)
            }
        }
    }

    /// Peer id of a parent task, mirroring the parent first when needed.
    fn resolve_parent_task(
        &mut self,
        parent_id: NativeId,
        visited: &mut HashSet<NativeId>,
    ) -> Result<NativeId, SyncError> {
        let system = self.source_system();
        if let Some(peer) = self.links.get(system, EntityKind::Task, parent_id) {
            return Ok(peer.id);
        }
        let parent = self.source.get_task(parent_id)?.ok_or_else(|| {
            SyncError::unresolvable(EntityKind::Task, "", parent_id, "source parent task not found")
        })?;
        debug!(parent = %parent.name, id = %parent_id, "mirroring parent task first");
        Ok(self.reconcile_task_inner(&parent, visited)?.peer())
    }

    /// Outcome of one field write: `Ok(true)` written, `Ok(false)` skipped
    /// with a warning, `Err` only for an unavailable system.
    fn apply(&self, task: &Task, field: &'static str, result: AdapterResult<()>) -> Result<bool, SyncError> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_unavailable() => Err(e.into()),
            Err(e) => {
                warn!(task = %task.name, id = %task.id, field, error = %e, "field left unchanged");
                Ok(false)
            }
        }
    }

    /// Store current modification times of both ends as their checkpoints so
    /// the writes just made are not picked up as changes on the next poll.
    fn complete(&mut self, task: &Task, peer: NativeId) -> Result<(), SyncError> {
        let (system, peer_system) = (self.source_system(), self.target.system());
        let source_modified = self
            .source
            .get_task(task.id)?
            .map_or(task.modified, |t| t.modified);
        self.links.set_checkpoint(
            system,
            EntityKind::Task,
            task.id,
            Checkpoint::from_datetime(source_modified),
        )?;
        if let Some(mirror) = self.target.get_task(peer)? {
            self.links.set_checkpoint(
                peer_system,
                EntityKind::Task,
                peer,
                Checkpoint::from_datetime(mirror.modified),
            )?;
        }
        Ok(())
    }
}

/// Creation needs an owner and a version; nothing is written without them.
fn missing_field(task: &Task) -> SyncError {
    SyncError::MissingRequiredField {
        kind: EntityKind::Task,
        name: task.name.clone(),
        id: task.id,
        field: if task.owner.is_none() { "owner" } else { "version" },
    }
}

fn dangling(kind: EntityKind, name: &str, id: NativeId, system: System, peer: NativeId) -> SyncError {
    SyncError::unresolvable(kind, name, id, format!("linked {system} {kind} {peer} no longer exists"))
}
