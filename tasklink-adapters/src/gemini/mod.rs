//! Gemini issue tracker adapter.
//!
//! Gemini priorities run high-to-low (the largest `order` is the most
//! urgent), so the project's priority list is read as a descending scale.
//! Task state comes from the issue resolution: a non-final resolution is
//! `Open`; a final, missing or unknown one is `Closed`.

mod http;
mod service;

pub use http::HttpGeminiService;
pub use service::{
    GeminiIssue, GeminiLookup, GeminiPriority, GeminiProject, GeminiResolution, GeminiService,
    GeminiUser, GeminiVersion, IssueComment, IssueFilter, SourceControlFile,
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tasklink_core::config::{CreationSelector, ProjectCreation};
use tasklink_core::vocabulary::{canonical_state_for, native_status_for};
use tasklink_core::{
    Checkpoint, EntityKind, NativeId, Options, PriorityScale, StatusDefinition, System, TaskState,
    DEFAULT_PRIORITY,
};

use crate::adapter::{
    description_or_name, ProjectStore, SystemAdapter, TaskStore, UserStore, VersionStore,
};
use crate::error::{AdapterError, AdapterResult, ServiceError};
use crate::model::{ChangeSubmission, NewTask, Project, Task, User, Version};

const SYSTEM: System = System::Gemini;

/// Surname given to accounts created for version-control users.
const CREATED_USER_SURNAME: &str = "PureCM";

fn gemini_err(err: ServiceError) -> AdapterError {
    AdapterError::from_service(SYSTEM, err)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CreationDefaults {
    issue_type: u64,
    status: u64,
    severity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProjectTemplate {
    Disabled,
    Missing(String),
    Ready(GeminiProject),
}

/// Per-project lookups needed to turn issues into canonical tasks.
struct IssueContext {
    priorities: Vec<GeminiPriority>,
    resolutions: Vec<StatusDefinition>,
    project_includable: bool,
}

pub struct GeminiAdapter<S> {
    service: S,
    base_url: String,
    update_url: bool,
    options: Options,
    template: ProjectTemplate,
    task_creation: Option<CreationDefaults>,
    feature_creation: Option<CreationDefaults>,
}

impl<S: GeminiService> GeminiAdapter<S> {
    /// Resolve the configured template project and creation selectors.
    ///
    /// Names that do not exist on the server disable the corresponding
    /// creation with a warning; only connectivity failures are errors.
    pub fn new(service: S, options: &Options) -> AdapterResult<Self> {
        let template = resolve_template(&service, &options.gemini.project_creation)?;

        let gemini = &options.gemini;
        let (task_creation, feature_creation) =
            if gemini.task_creation.enabled || gemini.feature_creation.enabled {
                let lookups = Lookups {
                    types: service.issue_types().map_err(gemini_err)?,
                    statuses: service.issue_statuses().map_err(gemini_err)?,
                    severities: service.issue_severities().map_err(gemini_err)?,
                };
                (
                    lookups.resolve("task", &gemini.task_creation),
                    lookups.resolve("feature", &gemini.feature_creation),
                )
            } else {
                (None, None)
            };

        Ok(Self {
            service,
            base_url: gemini.url.trim_end_matches('/').to_owned(),
            update_url: options.update_url,
            options: options.clone(),
            template,
            task_creation,
            feature_creation,
        })
    }

    pub fn task_creation_enabled(&self) -> bool {
        self.task_creation.is_some()
    }

    /// `<url>/Default.aspx?id=<issue>`, or empty when URL mirroring is off.
    pub fn issue_url(&self, id: u64) -> String {
        if self.update_url {
            format!("{}/Default.aspx?id={}", self.base_url, id)
        } else {
            String::new()
        }
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    fn to_project(&self, p: GeminiProject) -> Project {
        let includable = !p.archived && !self.options.is_project_excluded(&p.name);
        Project {
            id: NativeId(p.id),
            name: p.name,
            description: p.description,
            archived: p.archived,
            includable,
        }
    }

    fn to_user(&self, u: GeminiUser) -> User {
        let includable = !self.options.is_user_excluded(&u.user_name);
        User {
            id: NativeId(u.id),
            name: u.user_name,
            email: u.email,
            description: u.comment,
            includable,
        }
    }

    fn context(&self, project_id: u64) -> AdapterResult<IssueContext> {
        let priorities = self.service.priorities(project_id).map_err(gemini_err)?;
        let resolutions = self
            .service
            .resolutions()
            .map_err(gemini_err)?
            .into_iter()
            .map(|r| StatusDefinition {
                id: NativeId(r.id),
                name: r.description,
                is_final: r.is_final,
            })
            .collect();
        let project_includable = self
            .service
            .projects()
            .map_err(gemini_err)?
            .into_iter()
            .find(|p| p.id == project_id)
            .map(|p| self.to_project(p).includable)
            .unwrap_or(false);
        Ok(IssueContext {
            priorities,
            resolutions,
            project_includable,
        })
    }

    fn to_task(&self, issue: GeminiIssue, ctx: &IssueContext) -> AdapterResult<Task> {
        let owner = issue.resources.first().copied().map(NativeId);
        let owner_excluded = match owner {
            Some(id) => self
                .service
                .user(id.0)
                .map_err(gemini_err)?
                .is_some_and(|u| !self.to_user(u).includable),
            None => false,
        };

        let scale = priority_scale_of(&ctx.priorities);
        let priority = ctx
            .priorities
            .iter()
            .find(|p| p.id == issue.priority)
            .map(|p| scale.to_canonical(p.order))
            .unwrap_or(DEFAULT_PRIORITY);

        let state = canonical_state_for(
            ctx.resolutions
                .iter()
                .find(|r| r.id == NativeId(issue.resolution)),
        );

        let is_feature = self
            .feature_creation
            .is_some_and(|f| f.issue_type == issue.issue_type);

        Ok(Task {
            id: NativeId(issue.id),
            project: NativeId(issue.project_id),
            url: self.issue_url(issue.id),
            name: issue.summary,
            description: issue.long_desc,
            owner,
            version: (issue.fixed_in_version != 0).then_some(NativeId(issue.fixed_in_version)),
            parent: (issue.parent_issue_id != 0).then_some(NativeId(issue.parent_issue_id)),
            priority,
            state,
            modified: issue.date_revised,
            is_feature,
            includable: ctx.project_includable && !owner_excluded,
        })
    }

    fn fetch_issue(&self, id: NativeId) -> AdapterResult<GeminiIssue> {
        self.service
            .issue(id.0)
            .map_err(gemini_err)?
            .ok_or(AdapterError::NotFound {
                system: SYSTEM,
                kind: EntityKind::Task,
                id,
            })
    }

    /// Read-modify-write of one issue.
    fn modify(&self, id: NativeId, edit: impl FnOnce(&mut GeminiIssue)) -> AdapterResult<()> {
        let mut issue = self.fetch_issue(id)?;
        edit(&mut issue);
        self.service.update_issue(&issue).map_err(gemini_err)?;
        Ok(())
    }

    /// Native priority id for a canonical ordinal on `priorities`.
    fn priority_id(&self, priorities: &[GeminiPriority], canonical: u16) -> AdapterResult<u64> {
        let order = priority_scale_of(priorities).from_canonical(canonical);
        priorities
            .iter()
            .find(|p| p.order == order)
            .or_else(|| priorities.first())
            .map(|p| p.id)
            .ok_or(AdapterError::VocabularyMismatch {
                system: SYSTEM,
                field: "priority",
                wanted: canonical.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

fn resolve_template<S: GeminiService>(
    service: &S,
    creation: &ProjectCreation,
) -> AdapterResult<ProjectTemplate> {
    if !creation.enabled {
        return Ok(ProjectTemplate::Disabled);
    }
    let projects = service.projects().map_err(gemini_err)?;
    let found = match creation.template_name() {
        Some(name) => projects.into_iter().find(|p| p.name == name),
        None => projects.into_iter().next(),
    };
    Ok(match found {
        Some(project) => ProjectTemplate::Ready(project),
        None => {
            let name = creation.template_name().unwrap_or("(first project)").to_owned();
            warn!(system = %SYSTEM, template = %name, "template project not found; project creation disabled");
            ProjectTemplate::Missing(name)
        }
    })
}

struct Lookups {
    types: Vec<GeminiLookup>,
    statuses: Vec<GeminiLookup>,
    severities: Vec<GeminiLookup>,
}

impl Lookups {
    fn resolve(&self, kind: &str, selector: &CreationSelector) -> Option<CreationDefaults> {
        if !selector.enabled {
            return None;
        }
        let Some((ty, status, severity)) = selector.selectors() else {
            warn!(system = %SYSTEM, kind, "creation type, status or severity missing; creation disabled");
            return None;
        };
        Some(CreationDefaults {
            issue_type: lookup_id(&self.types, ty, kind, "type")?,
            status: lookup_id(&self.statuses, status, kind, "status")?,
            severity: lookup_id(&self.severities, severity, kind, "severity")?,
        })
    }
}

fn lookup_id(items: &[GeminiLookup], wanted: &str, kind: &str, field: &str) -> Option<u64> {
    let found = items.iter().find(|l| l.description == wanted).map(|l| l.id);
    if found.is_none() {
        warn!(system = %SYSTEM, kind, field, wanted, "creation selector not found; creation disabled");
    }
    found
}

/// Short upper-case project code derived from a project name.
fn project_code(name: &str) -> String {
    let code: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(10)
        .collect();
    if code.is_empty() {
        "PRJ".to_owned()
    } else {
        code
    }
}

/// Descending scale over a project's priority list, saturating at `u16::MAX` levels.
fn priority_scale_of(priorities: &[GeminiPriority]) -> PriorityScale {
    PriorityScale::descending(u16::try_from(priorities.len()).unwrap_or(u16::MAX))
}

fn modified_after(modified: DateTime<Utc>, since: DateTime<Utc>) -> bool {
    !Checkpoint::from_datetime(since).covers(modified)
}

// ---------------------------------------------------------------------------
// Capability impls
// ---------------------------------------------------------------------------

impl<S: GeminiService> ProjectStore for GeminiAdapter<S> {
    fn list_projects(&self) -> AdapterResult<Vec<Project>> {
        let projects = self.service.projects().map_err(gemini_err)?;
        Ok(projects.into_iter().map(|p| self.to_project(p)).collect())
    }

    fn get_project(&self, id: NativeId) -> AdapterResult<Option<Project>> {
        Ok(self.list_projects()?.into_iter().find(|p| p.id == id))
    }

    fn find_project_by_name(&self, name: &str) -> AdapterResult<Option<Project>> {
        Ok(self.list_projects()?.into_iter().find(|p| p.name == name))
    }

    fn create_project(&self, template: &Project) -> AdapterResult<Project> {
        let base = match &self.template {
            ProjectTemplate::Disabled => {
                return Err(AdapterError::CreationDisabled {
                    system: SYSTEM,
                    kind: EntityKind::Project,
                    name: template.name.clone(),
                })
            }
            ProjectTemplate::Missing(name) => {
                return Err(AdapterError::TemplateMissing {
                    system: SYSTEM,
                    template: name.clone(),
                })
            }
            ProjectTemplate::Ready(base) => base,
        };
        let project = GeminiProject {
            id: 0,
            code: project_code(&template.name),
            name: template.name.clone(),
            description: description_or_name(&template.description, &template.name).to_owned(),
            archived: false,
        };
        let created = self
            .service
            .create_project(&project, base.id)
            .map_err(gemini_err)?;
        info!(system = %SYSTEM, project = %created.name, id = created.id, template = %base.name, "created project");
        Ok(self.to_project(created))
    }
}

impl<S: GeminiService> VersionStore for GeminiAdapter<S> {
    fn list_versions(&self, project: NativeId) -> AdapterResult<Vec<Version>> {
        let versions = self.service.versions(project.0).map_err(gemini_err)?;
        Ok(versions.into_iter().map(to_version).collect())
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
        let version = GeminiVersion {
            id: 0,
            project_id: project.0,
            name: name.to_owned(),
            number: name.to_owned(),
            description: description_or_name(description, name).to_owned(),
            parent_id: parent.map_or(0, |p| p.0),
        };
        let created = self.service.create_version(&version).map_err(gemini_err)?;
        info!(system = %SYSTEM, project = %project, version = %created.name, id = created.id, "created version");
        Ok(to_version(created))
    }
}

fn to_version(v: GeminiVersion) -> Version {
    Version {
        id: NativeId(v.id),
        project: NativeId(v.project_id),
        name: v.name,
        description: v.description,
        parent: (v.parent_id != 0).then_some(NativeId(v.parent_id)),
    }
}

impl<S: GeminiService> TaskStore for GeminiAdapter<S> {
    fn recent_tasks(&self, project: NativeId, since: DateTime<Utc>) -> AdapterResult<Vec<Task>> {
        // The server filter is day-granular; narrow it down to the second here.
        let filter = IssueFilter {
            project_id: project.0,
            exclude_closed: false,
            revised_after: (since > DateTime::<Utc>::default()).then(|| since.date_naive()),
        };
        let issues = self.service.filtered_issues(&filter).map_err(gemini_err)?;
        let ctx = self.context(project.0)?;
        let mut tasks = Vec::new();
        for issue in issues {
            if modified_after(issue.date_revised, since) {
                tasks.push(self.to_task(issue, &ctx)?);
            }
        }
        debug!(system = %SYSTEM, project = %project, count = tasks.len(), "recent tasks");
        Ok(tasks)
    }

    fn get_task(&self, id: NativeId) -> AdapterResult<Option<Task>> {
        match self.service.issue(id.0).map_err(gemini_err)? {
            Some(issue) => {
                let ctx = self.context(issue.project_id)?;
                self.to_task(issue, &ctx).map(Some)
            }
            None => Ok(None),
        }
    }

    fn create_task(&self, project: NativeId, fields: &NewTask) -> AdapterResult<Task> {
        let defaults = if fields.is_feature {
            self.feature_creation.or(self.task_creation)
        } else {
            self.task_creation
        };
        let defaults = defaults.ok_or_else(|| AdapterError::CreationDisabled {
            system: SYSTEM,
            kind: EntityKind::Task,
            name: fields.name.clone(),
        })?;

        let reporter = self.service.who_am_i().map_err(gemini_err)?;
        let ctx = self.context(project.0)?;
        let issue = GeminiIssue {
            id: 0,
            project_id: project.0,
            summary: fields.name.clone(),
            long_desc: description_or_name(&fields.description, &fields.name).to_owned(),
            issue_type: defaults.issue_type,
            status: defaults.status,
            severity: defaults.severity,
            priority: self.priority_id(&ctx.priorities, fields.priority)?,
            resolution: 0,
            risk_level: 1,
            reported_by: reporter.id,
            resources: fields.owner.map(|o| o.0).into_iter().collect(),
            fixed_in_version: fields.version.map_or(0, |v| v.0),
            parent_issue_id: fields.parent.map_or(0, |p| p.0),
            date_revised: Utc::now(),
        };
        let created = self.service.create_issue(&issue).map_err(gemini_err)?;
        info!(system = %SYSTEM, project = %project, task = %created.summary, id = created.id, "created issue");
        self.to_task(created, &ctx)
    }

    fn set_name(&self, id: NativeId, name: &str) -> AdapterResult<()> {
        self.modify(id, |i| i.summary = name.to_owned())
    }

    fn set_description(&self, id: NativeId, description: &str) -> AdapterResult<()> {
        self.modify(id, |i| i.long_desc = description.to_owned())
    }

    fn set_owner(&self, id: NativeId, owner: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |i| i.resources = owner.map(|o| o.0).into_iter().collect())
    }

    fn set_version(&self, id: NativeId, version: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |i| i.fixed_in_version = version.map_or(0, |v| v.0))
    }

    fn set_parent(&self, id: NativeId, parent: Option<NativeId>) -> AdapterResult<()> {
        self.modify(id, |i| i.parent_issue_id = parent.map_or(0, |p| p.0))
    }

    fn set_state(&self, id: NativeId, state: TaskState) -> AdapterResult<()> {
        let definitions: Vec<StatusDefinition> = self
            .service
            .resolutions()
            .map_err(gemini_err)?
            .into_iter()
            .map(|r| StatusDefinition {
                id: NativeId(r.id),
                name: r.description,
                is_final: r.is_final,
            })
            .collect();
        let resolution = native_status_for(&definitions, state)
            .map(|d| d.id.0)
            .ok_or_else(|| AdapterError::VocabularyMismatch {
                system: SYSTEM,
                field: "resolution",
                wanted: state.to_string(),
            })?;
        self.modify(id, |i| i.resolution = resolution)
    }

    fn set_priority(&self, id: NativeId, priority: u16) -> AdapterResult<()> {
        let issue = self.fetch_issue(id)?;
        let priorities = self.service.priorities(issue.project_id).map_err(gemini_err)?;
        let native = self.priority_id(&priorities, priority)?;
        self.modify(id, |i| i.priority = native)
    }

    fn set_url(&self, id: NativeId, _url: &str) -> AdapterResult<()> {
        debug!(system = %SYSTEM, id = %id, "issue URLs are derived; ignoring set_url");
        Ok(())
    }

    fn priority_scale(&self, project: NativeId) -> AdapterResult<PriorityScale> {
        let priorities = self.service.priorities(project.0).map_err(gemini_err)?;
        Ok(priority_scale_of(&priorities))
    }

    fn attach_change(&self, id: NativeId, change: &ChangeSubmission) -> AdapterResult<()> {
        let issue = self.fetch_issue(id)?;
        for item in &change.items {
            let path = item.current_path();
            let file = SourceControlFile {
                issue_id: issue.id,
                project_id: issue.project_id,
                file_name: path.rsplit('/').next().unwrap_or(path).to_owned(),
                file_path: path.to_owned(),
                change_id: change.change_id,
            };
            self.service
                .create_source_control_file(&file)
                .map_err(gemini_err)?;
        }

        let me = self.service.who_am_i().map_err(gemini_err)?;
        let comment = IssueComment {
            issue_id: issue.id,
            project_id: issue.project_id,
            user_id: me.id,
            comment: change.summary_lines().join("<br/>"),
        };
        self.service.create_comment(&comment).map_err(gemini_err)?;
        info!(system = %SYSTEM, id = %id, change = change.change_id, files = change.items.len(), "attached change");
        Ok(())
    }
}

impl<S: GeminiService> UserStore for GeminiAdapter<S> {
    fn get_user(&self, id: NativeId) -> AdapterResult<Option<User>> {
        let user = self.service.user(id.0).map_err(gemini_err)?;
        Ok(user.map(|u| self.to_user(u)))
    }

    fn find_user_by_name(&self, name: &str) -> AdapterResult<Option<User>> {
        let user = self.service.user_by_name(name).map_err(gemini_err)?;
        Ok(user.map(|u| self.to_user(u)))
    }

    fn create_user(&self, name: &str, email: &str, description: &str) -> AdapterResult<User> {
        let user = GeminiUser {
            id: 0,
            user_name: name.to_owned(),
            first_name: name.to_owned(),
            surname: CREATED_USER_SURNAME.to_owned(),
            email: if email.trim().is_empty() {
                "Unspecified".to_owned()
            } else {
                email.to_owned()
            },
            comment: description.to_owned(),
        };
        let quota = || AdapterError::QuotaExceeded {
            system: SYSTEM,
            name: name.to_owned(),
        };
        match self.service.create_user(&user) {
            Ok(created) if created.id != 0 => {
                info!(system = %SYSTEM, user = %created.user_name, id = created.id, "created user");
                Ok(self.to_user(created))
            }
            Ok(_) | Err(ServiceError::Rejected(_)) => Err(quota()),
            Err(e) => Err(gemini_err(e)),
        }
    }
}

impl<S: GeminiService> SystemAdapter for GeminiAdapter<S> {
    fn system(&self) -> System {
        SYSTEM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGemini;

    fn options() -> Options {
        let mut options = Options::default();
        options.gemini.url = "https://gemini.example.com/".into();
        options.gemini.task_creation = CreationSelector {
            enabled: true,
            creation_type: Some("Bug".into()),
            creation_status: Some("Assigned".into()),
            creation_severity: Some("Normal".into()),
        };
        options
    }

    #[test]
    fn project_code_is_short_and_upper_case() {
        assert_eq!(project_code("web shop v2"), "WEBSHOPV2");
        assert_eq!(project_code("***"), "PRJ");
        assert_eq!(project_code("a-very-long-project-name").len(), 10);
    }

    #[test]
    fn url_follows_default_aspx_format() {
        let adapter = GeminiAdapter::new(MemoryGemini::new(), &options()).unwrap();
        assert_eq!(adapter.issue_url(12), "https://gemini.example.com/Default.aspx?id=12");

        let mut no_url = options();
        no_url.update_url = false;
        let adapter = GeminiAdapter::new(MemoryGemini::new(), &no_url).unwrap();
        assert_eq!(adapter.issue_url(12), "");
    }

    #[test]
    fn unknown_selector_disables_creation() {
        let mut opts = options();
        opts.gemini.task_creation.creation_status = Some("Nonexistent".into());
        let adapter = GeminiAdapter::new(MemoryGemini::new(), &opts).unwrap();
        assert!(!adapter.task_creation_enabled());

        let gemini = MemoryGemini::new();
        let project = gemini.add_project("Web");
        let err = adapter.create_task(project, &NewTask::default()).unwrap_err();
        assert!(matches!(err, AdapterError::CreationDisabled { .. }), "got: {err}");
    }

    #[test]
    fn missing_template_surfaces_on_create() {
        let mut opts = options();
        opts.gemini.project_creation = ProjectCreation {
            enabled: true,
            template: Some("Template".into()),
        };
        let gemini = MemoryGemini::new();
        gemini.add_project("Web");
        let adapter = GeminiAdapter::new(gemini, &opts).unwrap();

        let source = Project {
            id: NativeId(9),
            name: "Mobile".into(),
            description: String::new(),
            archived: false,
            includable: true,
        };
        let err = adapter.create_project(&source).unwrap_err();
        assert!(matches!(err, AdapterError::TemplateMissing { .. }), "got: {err}");
    }

    #[test]
    fn first_project_is_the_default_template() {
        let mut opts = options();
        opts.gemini.project_creation = ProjectCreation { enabled: true, template: None };
        let gemini = MemoryGemini::new();
        gemini.add_project("Web");
        let adapter = GeminiAdapter::new(gemini, &opts).unwrap();

        let source = Project {
            id: NativeId(9),
            name: "Mobile".into(),
            description: String::new(),
            archived: false,
            includable: true,
        };
        let created = adapter.create_project(&source).unwrap();
        assert_eq!(created.name, "Mobile");
        assert_eq!(created.description, "Mobile");
    }

    #[test]
    fn excluded_owner_makes_task_not_includable() {
        let mut opts = options();
        opts.excluded_users.push("build".into());
        let gemini = MemoryGemini::new();
        let project = gemini.add_project("Web");
        let build = gemini.add_user("build");
        let issue = gemini.add_issue(project, "nightly failed");
        gemini.edit_issue(issue, |i| i.resources = vec![build.0]);

        let adapter = GeminiAdapter::new(gemini, &opts).unwrap();
        let task = adapter.get_task(issue).unwrap().unwrap();
        assert!(!task.includable);
    }

    #[test]
    fn created_user_gets_placeholder_email() {
        let gemini = MemoryGemini::new();
        let adapter = GeminiAdapter::new(gemini.clone(), &options()).unwrap();
        let user = adapter.create_user("alice", "", "from PureCM").unwrap();
        assert_eq!(user.email, "Unspecified");
        let stored = gemini.user_snapshot(user.id).unwrap();
        assert_eq!(stored.surname, "PureCM");
    }

    #[test]
    fn refused_user_is_quota_exceeded() {
        let gemini = MemoryGemini::new();
        gemini.set_user_quota(Some(1));
        let adapter = GeminiAdapter::new(gemini, &options()).unwrap();
        let err = adapter.create_user("bob", "bob@example.com", "").unwrap_err();
        assert!(matches!(err, AdapterError::QuotaExceeded { .. }), "got: {err}");
    }

    #[test]
    fn oversized_priority_list_saturates_the_scale() {
        let priorities: Vec<GeminiPriority> = (0..70_000u32)
            .map(|n| GeminiPriority {
                id: u64::from(n),
                order: 1,
                description: String::new(),
            })
            .collect();
        assert_eq!(priority_scale_of(&priorities).levels(), u16::MAX);
        assert_eq!(priority_scale_of(&priorities[..5]).levels(), 5);
    }
}
