use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use tasklink_core::NativeId;

use super::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::purecm::{PcmProject, PcmState, PcmTask, PcmUser, PcmVersion, PureCmService};

/// Thread-safe in-memory PureCM repository.
#[derive(Debug, Clone)]
pub struct MemoryPureCm {
    state: Arc<RwLock<PureCmState>>,
    clock: Clock,
}

#[derive(Debug, Default)]
struct PureCmState {
    next_id: u64,
    projects: Vec<PcmProject>,
    versions: Vec<PcmVersion>,
    tasks: BTreeMap<u64, PcmTask>,
    users: Vec<PcmUser>,
    user_quota: Option<usize>,
    offline: bool,
    writes: usize,
}

impl PureCmState {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Default for MemoryPureCm {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPureCm {
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Ids start at 1000 so they never collide with a fresh `MemoryGemini`.
    pub fn with_clock(clock: Clock) -> Self {
        let state = PureCmState {
            next_id: 1000,
            ..PureCmState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            clock,
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, PureCmState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> ServiceResult<RwLockWriteGuard<'_, PureCmState>> {
        let state = self.state();
        if state.offline {
            return Err(ServiceError::Transport("connection refused".into()));
        }
        Ok(state)
    }

    // -----------------------------------------------------------------------
    // Scenario helpers
    // -----------------------------------------------------------------------

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn add_project(&self, name: &str) -> NativeId {
        let mut s = self.state();
        let id = s.alloc();
        s.projects.push(PcmProject {
            id,
            name: name.to_owned(),
            description: String::new(),
            archived: false,
        });
        NativeId(id)
    }

    pub fn archive_project(&self, id: NativeId) {
        if let Some(p) = self.state().projects.iter_mut().find(|p| p.id == id.0) {
            p.archived = true;
        }
    }

    pub fn add_version(&self, project: NativeId, name: &str, parent: Option<NativeId>) -> NativeId {
        let mut s = self.state();
        let id = s.alloc();
        s.versions.push(PcmVersion {
            id,
            project_id: project.0,
            name: name.to_owned(),
            description: String::new(),
            parent_id: parent.map(|p| p.0),
        });
        NativeId(id)
    }

    pub fn add_user(&self, name: &str) -> NativeId {
        let mut s = self.state();
        let id = s.alloc();
        s.users.push(PcmUser {
            id,
            name: name.to_owned(),
            email: format!("{name}@example.com"),
            description: String::new(),
        });
        NativeId(id)
    }

    /// An open task at priority 3, modified now.
    pub fn add_task(&self, project: NativeId, name: &str) -> NativeId {
        let now = self.clock.now();
        let mut s = self.state();
        let id = s.alloc();
        s.tasks.insert(
            id,
            PcmTask {
                id,
                project_id: project.0,
                name: name.to_owned(),
                description: String::new(),
                owner_id: None,
                version_id: None,
                parent_id: None,
                priority: 3,
                state: PcmState::Open,
                is_feature: false,
                url: String::new(),
                modified: now,
            },
        );
        NativeId(id)
    }

    /// Edit a task as a PureCM user would; bumps its modification time.
    pub fn edit_task(&self, id: NativeId, edit: impl FnOnce(&mut PcmTask)) {
        let now = self.clock.now();
        if let Some(task) = self.state().tasks.get_mut(&id.0) {
            edit(task);
            task.modified = now;
        }
    }

    pub fn task_snapshot(&self, id: NativeId) -> Option<PcmTask> {
        self.state().tasks.get(&id.0).cloned()
    }

    pub fn tasks_in(&self, project: NativeId) -> Vec<PcmTask> {
        self.state()
            .tasks
            .values()
            .filter(|t| t.project_id == project.0)
            .cloned()
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.state().tasks.len()
    }

    pub fn projects_snapshot(&self) -> Vec<PcmProject> {
        self.state().projects.clone()
    }

    pub fn versions_snapshot(&self, project: NativeId) -> Vec<PcmVersion> {
        self.state()
            .versions
            .iter()
            .filter(|v| v.project_id == project.0)
            .cloned()
            .collect()
    }

    pub fn users_snapshot(&self) -> Vec<PcmUser> {
        self.state().users.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Maximum number of accounts; further creations are rejected.
    pub fn set_user_quota(&self, quota: Option<usize>) {
        self.state().user_quota = quota;
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }
}

impl PureCmService for MemoryPureCm {
    fn projects(&self) -> ServiceResult<Vec<PcmProject>> {
        Ok(self.live()?.projects.clone())
    }

    fn create_project(&self, project: &PcmProject) -> ServiceResult<PcmProject> {
        let mut s = self.live()?;
        let mut created = project.clone();
        created.id = s.alloc();
        s.projects.push(created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<PcmVersion>> {
        let s = self.live()?;
        Ok(s.versions
            .iter()
            .filter(|v| v.project_id == project_id)
            .cloned()
            .collect())
    }

    fn create_version(&self, version: &PcmVersion) -> ServiceResult<PcmVersion> {
        let mut s = self.live()?;
        let mut created = version.clone();
        created.id = s.alloc();
        s.versions.push(created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn tasks_changed_since(
        &self,
        project_id: u64,
        since: DateTime<Utc>,
    ) -> ServiceResult<Vec<PcmTask>> {
        let s = self.live()?;
        Ok(s.tasks
            .values()
            .filter(|t| t.project_id == project_id && t.modified > since)
            .cloned()
            .collect())
    }

    fn task(&self, id: u64) -> ServiceResult<Option<PcmTask>> {
        Ok(self.live()?.tasks.get(&id).cloned())
    }

    fn create_task(&self, task: &PcmTask) -> ServiceResult<PcmTask> {
        let now = self.clock.now();
        let mut s = self.live()?;
        let mut created = task.clone();
        created.id = s.alloc();
        created.modified = now;
        s.tasks.insert(created.id, created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn update_task(&self, task: &PcmTask) -> ServiceResult<PcmTask> {
        let now = self.clock.now();
        let mut s = self.live()?;
        if !s.tasks.contains_key(&task.id) {
            return Err(ServiceError::Rejected(format!("no task {}", task.id)));
        }
        let mut updated = task.clone();
        updated.modified = now;
        s.tasks.insert(updated.id, updated.clone());
        s.writes += 1;
        Ok(updated)
    }

    fn users(&self) -> ServiceResult<Vec<PcmUser>> {
        Ok(self.live()?.users.clone())
    }

    fn user(&self, id: u64) -> ServiceResult<Option<PcmUser>> {
        Ok(self.live()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn create_user(&self, user: &PcmUser) -> ServiceResult<PcmUser> {
        let mut s = self.live()?;
        if s.user_quota.is_some_and(|q| s.users.len() >= q) {
            return Err(ServiceError::Rejected("licence limit reached".into()));
        }
        let mut created = user.clone();
        created.id = s.alloc();
        s.users.push(created.clone());
        s.writes += 1;
        Ok(created)
    }
}
