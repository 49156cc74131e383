//! Gemini wire boundary: records as the tracker stores them and one trait
//! method per remote call.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiProject {
    pub id: u64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiVersion {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub description: String,
    /// 0 for a root version.
    #[serde(default)]
    pub parent_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiIssue {
    pub id: u64,
    pub project_id: u64,
    pub summary: String,
    #[serde(default)]
    pub long_desc: String,
    pub issue_type: u64,
    pub status: u64,
    pub severity: u64,
    pub priority: u64,
    #[serde(default)]
    pub resolution: u64,
    #[serde(default)]
    pub risk_level: u32,
    #[serde(default)]
    pub reported_by: u64,
    #[serde(default)]
    pub resources: Vec<u64>,
    /// 0 when unset.
    #[serde(default)]
    pub fixed_in_version: u64,
    /// 0 when unset.
    #[serde(default)]
    pub parent_issue_id: u64,
    pub date_revised: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUser {
    pub id: u64,
    pub user_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub comment: String,
}

/// Priority level of one project; higher `order` is more urgent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPriority {
    pub id: u64,
    pub order: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResolution {
    pub id: u64,
    pub description: String,
    pub is_final: bool,
}

/// Issue types, statuses and severities all share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiLookup {
    pub id: u64,
    pub description: String,
}

/// Server-side issue filter. `revised_after` only has day resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilter {
    pub project_id: u64,
    pub exclude_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_after: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueComment {
    pub issue_id: u64,
    pub project_id: u64,
    pub user_id: u64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceControlFile {
    pub issue_id: u64,
    pub project_id: u64,
    pub file_name: String,
    pub file_path: String,
    pub change_id: u64,
}

pub trait GeminiService: Send {
    fn projects(&self) -> ServiceResult<Vec<GeminiProject>>;
    /// Create `project` with the schemes (priorities, workflow) of `template_id`.
    fn create_project(&self, project: &GeminiProject, template_id: u64)
        -> ServiceResult<GeminiProject>;

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<GeminiVersion>>;
    fn create_version(&self, version: &GeminiVersion) -> ServiceResult<GeminiVersion>;

    fn filtered_issues(&self, filter: &IssueFilter) -> ServiceResult<Vec<GeminiIssue>>;
    fn issue(&self, id: u64) -> ServiceResult<Option<GeminiIssue>>;
    fn create_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue>;
    fn update_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue>;

    fn priorities(&self, project_id: u64) -> ServiceResult<Vec<GeminiPriority>>;
    fn resolutions(&self) -> ServiceResult<Vec<GeminiResolution>>;
    fn issue_types(&self) -> ServiceResult<Vec<GeminiLookup>>;
    fn issue_statuses(&self) -> ServiceResult<Vec<GeminiLookup>>;
    fn issue_severities(&self) -> ServiceResult<Vec<GeminiLookup>>;

    fn user(&self, id: u64) -> ServiceResult<Option<GeminiUser>>;
    fn user_by_name(&self, user_name: &str) -> ServiceResult<Option<GeminiUser>>;
    fn create_user(&self, user: &GeminiUser) -> ServiceResult<GeminiUser>;
    /// The account the service authenticates as.
    fn who_am_i(&self) -> ServiceResult<GeminiUser>;

    fn create_comment(&self, comment: &IssueComment) -> ServiceResult<()>;
    fn create_source_control_file(&self, file: &SourceControlFile) -> ServiceResult<()>;
}
