use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use tasklink_core::NativeId;

use super::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::gemini::{
    GeminiIssue, GeminiLookup, GeminiPriority, GeminiProject, GeminiResolution, GeminiService,
    GeminiUser, GeminiVersion, IssueComment, IssueFilter, SourceControlFile,
};

/// Thread-safe in-memory Gemini server.
///
/// Seeded with an API user, five priority levels, resolutions
/// `Unresolved` / `Fixed` / `Won't Fix`, issue types `Bug` / `Feature`,
/// status `Assigned` and severity `Normal`.
#[derive(Debug, Clone)]
pub struct MemoryGemini {
    state: Arc<RwLock<GeminiState>>,
    clock: Clock,
}

#[derive(Debug, Default)]
struct GeminiState {
    next_id: u64,
    projects: Vec<GeminiProject>,
    versions: Vec<GeminiVersion>,
    issues: BTreeMap<u64, GeminiIssue>,
    priorities: HashMap<u64, Vec<GeminiPriority>>,
    default_priorities: Vec<GeminiPriority>,
    resolutions: Vec<GeminiResolution>,
    types: Vec<GeminiLookup>,
    statuses: Vec<GeminiLookup>,
    severities: Vec<GeminiLookup>,
    users: Vec<GeminiUser>,
    api_user: u64,
    comments: Vec<IssueComment>,
    files: Vec<SourceControlFile>,
    user_quota: Option<usize>,
    offline: bool,
    malformed: BTreeSet<u64>,
    writes: usize,
}

impl GeminiState {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn lookup(&mut self, description: &str) -> GeminiLookup {
        GeminiLookup {
            id: self.alloc(),
            description: description.to_owned(),
        }
    }

    /// Levels named after their order; order `levels` is the most urgent.
    fn make_priorities(&mut self, levels: u16) -> Vec<GeminiPriority> {
        (1..=levels)
            .map(|order| GeminiPriority {
                id: self.alloc(),
                order,
                description: format!("P{}", levels - order + 1),
            })
            .collect()
    }

    fn priorities_for(&self, project_id: u64) -> Vec<GeminiPriority> {
        self.priorities
            .get(&project_id)
            .cloned()
            .unwrap_or_else(|| self.default_priorities.clone())
    }

    fn first_open_resolution(&self) -> u64 {
        self.resolutions
            .iter()
            .find(|r| !r.is_final)
            .map_or(0, |r| r.id)
    }

    fn touch(&mut self, issue_id: u64, now: DateTime<Utc>) {
        if let Some(issue) = self.issues.get_mut(&issue_id) {
            issue.date_revised = now;
        }
    }
}

impl Default for MemoryGemini {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGemini {
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    pub fn with_clock(clock: Clock) -> Self {
        let mut s = GeminiState::default();
        s.api_user = s.alloc();
        s.users.push(GeminiUser {
            id: s.api_user,
            user_name: "tasklink".into(),
            first_name: "tasklink".into(),
            surname: String::new(),
            email: String::new(),
            comment: String::new(),
        });
        s.default_priorities = s.make_priorities(5);
        for (description, is_final) in [("Unresolved", false), ("Fixed", true), ("Won't Fix", true)] {
            let id = s.alloc();
            s.resolutions.push(GeminiResolution {
                id,
                description: description.into(),
                is_final,
            });
        }
        s.types = vec![s.lookup("Bug"), s.lookup("Feature")];
        s.statuses = vec![s.lookup("Assigned")];
        s.severities = vec![s.lookup("Normal")];
        Self {
            state: Arc::new(RwLock::new(s)),
            clock,
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, GeminiState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// State guard for service calls; fails while the server is offline.
    fn live(&self) -> ServiceResult<RwLockWriteGuard<'_, GeminiState>> {
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
        s.projects.push(GeminiProject {
            id,
            code: name.to_ascii_uppercase(),
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

    /// Replace a project's priority list with `levels` levels.
    pub fn set_priority_levels(&self, project: NativeId, levels: u16) {
        let mut s = self.state();
        let priorities = s.make_priorities(levels);
        s.priorities.insert(project.0, priorities);
    }

    pub fn add_version(&self, project: NativeId, name: &str, parent: Option<NativeId>) -> NativeId {
        let mut s = self.state();
        let id = s.alloc();
        s.versions.push(GeminiVersion {
            id,
            project_id: project.0,
            name: name.to_owned(),
            number: name.to_owned(),
            description: String::new(),
            parent_id: parent.map_or(0, |p| p.0),
        });
        NativeId(id)
    }

    pub fn add_user(&self, name: &str) -> NativeId {
        let mut s = self.state();
        let id = s.alloc();
        s.users.push(GeminiUser {
            id,
            user_name: name.to_owned(),
            first_name: name.to_owned(),
            surname: String::new(),
            email: format!("{name}@example.com"),
            comment: String::new(),
        });
        NativeId(id)
    }

    /// An open `Bug` with the middle priority, revised now.
    pub fn add_issue(&self, project: NativeId, summary: &str) -> NativeId {
        let now = self.clock.now();
        let mut s = self.state();
        let id = s.alloc();
        let priorities = s.priorities_for(project.0);
        let middle = (priorities.len() as u16 + 1) / 2;
        let issue = GeminiIssue {
            id,
            project_id: project.0,
            summary: summary.to_owned(),
            long_desc: String::new(),
            issue_type: s.types.first().map_or(0, |t| t.id),
            status: s.statuses.first().map_or(0, |t| t.id),
            severity: s.severities.first().map_or(0, |t| t.id),
            priority: priorities
                .iter()
                .find(|p| p.order == middle)
                .map_or(0, |p| p.id),
            resolution: s.first_open_resolution(),
            risk_level: 1,
            reported_by: s.api_user,
            resources: Vec::new(),
            fixed_in_version: 0,
            parent_issue_id: 0,
            date_revised: now,
        };
        s.issues.insert(id, issue);
        NativeId(id)
    }

    /// Edit an issue as a tracker user would; bumps its revision time.
    pub fn edit_issue(&self, id: NativeId, edit: impl FnOnce(&mut GeminiIssue)) {
        let now = self.clock.now();
        if let Some(issue) = self.state().issues.get_mut(&id.0) {
            edit(issue);
            issue.date_revised = now;
        }
    }

    /// Id of the priority at `order` (1 = least urgent) in a project.
    pub fn priority_id(&self, project: NativeId, order: u16) -> Option<u64> {
        self.state()
            .priorities_for(project.0)
            .into_iter()
            .find(|p| p.order == order)
            .map(|p| p.id)
    }

    pub fn resolution_id(&self, description: &str) -> Option<u64> {
        self.state()
            .resolutions
            .iter()
            .find(|r| r.description == description)
            .map(|r| r.id)
    }

    pub fn issue_snapshot(&self, id: NativeId) -> Option<GeminiIssue> {
        self.state().issues.get(&id.0).cloned()
    }

    pub fn issues_in(&self, project: NativeId) -> Vec<GeminiIssue> {
        self.state()
            .issues
            .values()
            .filter(|i| i.project_id == project.0)
            .cloned()
            .collect()
    }

    pub fn issue_count(&self) -> usize {
        self.state().issues.len()
    }

    pub fn projects_snapshot(&self) -> Vec<GeminiProject> {
        self.state().projects.clone()
    }

    pub fn versions_snapshot(&self, project: NativeId) -> Vec<GeminiVersion> {
        self.state()
            .versions
            .iter()
            .filter(|v| v.project_id == project.0)
            .cloned()
            .collect()
    }

    pub fn user_snapshot(&self, id: NativeId) -> Option<GeminiUser> {
        self.state().users.iter().find(|u| u.id == id.0).cloned()
    }

    pub fn comments(&self) -> Vec<IssueComment> {
        self.state().comments.clone()
    }

    pub fn source_files(&self) -> Vec<SourceControlFile> {
        self.state().files.clone()
    }

    /// Mutating service calls served so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Maximum number of accounts; further creations return id 0.
    pub fn set_user_quota(&self, quota: Option<usize>) {
        self.state().user_quota = quota;
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Serve `id` as a payload that fails to decode.
    pub fn corrupt_issue(&self, id: NativeId) {
        self.state().malformed.insert(id.0);
    }
}

impl GeminiService for MemoryGemini {
    fn projects(&self) -> ServiceResult<Vec<GeminiProject>> {
        Ok(self.live()?.projects.clone())
    }

    fn create_project(
        &self,
        project: &GeminiProject,
        template_id: u64,
    ) -> ServiceResult<GeminiProject> {
        let mut s = self.live()?;
        if !s.projects.iter().any(|p| p.id == template_id) {
            return Err(ServiceError::Rejected(format!("no template project {template_id}")));
        }
        let mut created = project.clone();
        created.id = s.alloc();
        let priorities = s.priorities_for(template_id);
        s.priorities.insert(created.id, priorities);
        s.projects.push(created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<GeminiVersion>> {
        let s = self.live()?;
        Ok(s.versions
            .iter()
            .filter(|v| v.project_id == project_id)
            .cloned()
            .collect())
    }

    fn create_version(&self, version: &GeminiVersion) -> ServiceResult<GeminiVersion> {
        let mut s = self.live()?;
        let mut created = version.clone();
        created.id = s.alloc();
        s.versions.push(created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn filtered_issues(&self, filter: &IssueFilter) -> ServiceResult<Vec<GeminiIssue>> {
        let s = self.live()?;
        let final_ids: Vec<u64> = s
            .resolutions
            .iter()
            .filter(|r| r.is_final)
            .map(|r| r.id)
            .collect();
        Ok(s.issues
            .values()
            .filter(|i| i.project_id == filter.project_id)
            .filter(|i| !filter.exclude_closed || !final_ids.contains(&i.resolution))
            .filter(|i| {
                filter
                    .revised_after
                    .map_or(true, |day| i.date_revised.date_naive() >= day)
            })
            .cloned()
            .collect())
    }

    fn issue(&self, id: u64) -> ServiceResult<Option<GeminiIssue>> {
        let s = self.live()?;
        if s.malformed.contains(&id) {
            return Err(ServiceError::Decode(format!("issue {id}: missing field `ProjectID`")));
        }
        Ok(s.issues.get(&id).cloned())
    }

    fn create_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue> {
        let now = self.clock.now();
        let mut s = self.live()?;
        let mut created = issue.clone();
        created.id = s.alloc();
        created.date_revised = now;
        if created.resolution == 0 {
            created.resolution = s.first_open_resolution();
        }
        s.issues.insert(created.id, created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn update_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue> {
        let now = self.clock.now();
        let mut s = self.live()?;
        if !s.issues.contains_key(&issue.id) {
            return Err(ServiceError::Rejected(format!("no issue {}", issue.id)));
        }
        let mut updated = issue.clone();
        updated.date_revised = now;
        s.issues.insert(updated.id, updated.clone());
        s.writes += 1;
        Ok(updated)
    }

    fn priorities(&self, project_id: u64) -> ServiceResult<Vec<GeminiPriority>> {
        Ok(self.live()?.priorities_for(project_id))
    }

    fn resolutions(&self) -> ServiceResult<Vec<GeminiResolution>> {
        Ok(self.live()?.resolutions.clone())
    }

    fn issue_types(&self) -> ServiceResult<Vec<GeminiLookup>> {
        Ok(self.live()?.types.clone())
    }

    fn issue_statuses(&self) -> ServiceResult<Vec<GeminiLookup>> {
        Ok(self.live()?.statuses.clone())
    }

    fn issue_severities(&self) -> ServiceResult<Vec<GeminiLookup>> {
        Ok(self.live()?.severities.clone())
    }

    fn user(&self, id: u64) -> ServiceResult<Option<GeminiUser>> {
        Ok(self.live()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn user_by_name(&self, user_name: &str) -> ServiceResult<Option<GeminiUser>> {
        Ok(self
            .live()?
            .users
            .iter()
            .find(|u| u.user_name == user_name)
            .cloned())
    }

    fn create_user(&self, user: &GeminiUser) -> ServiceResult<GeminiUser> {
        let mut s = self.live()?;
        let mut created = user.clone();
        if s.user_quota.is_some_and(|q| s.users.len() >= q) {
            created.id = 0;
            return Ok(created);
        }
        created.id = s.alloc();
        s.users.push(created.clone());
        s.writes += 1;
        Ok(created)
    }

    fn who_am_i(&self) -> ServiceResult<GeminiUser> {
        let s = self.live()?;
        s.users
            .iter()
            .find(|u| u.id == s.api_user)
            .cloned()
            .ok_or_else(|| ServiceError::Decode("api user missing".into()))
    }

    fn create_comment(&self, comment: &IssueComment) -> ServiceResult<()> {
        let now = self.clock.now();
        let mut s = self.live()?;
        s.comments.push(comment.clone());
        s.touch(comment.issue_id, now);
        s.writes += 1;
        Ok(())
    }

    fn create_source_control_file(&self, file: &SourceControlFile) -> ServiceResult<()> {
        let now = self.clock.now();
        let mut s = self.live()?;
        s.files.push(file.clone());
        s.touch(file.issue_id, now);
        s.writes += 1;
        Ok(())
    }
}
