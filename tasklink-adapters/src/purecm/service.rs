//! PureCM wire boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmVersion {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// Task states as the ledger stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmState {
    Open,
    Completed,
    Closed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmTask {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub version_id: Option<u64>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// 1 is the highest priority.
    pub priority: u16,
    pub state: PcmState,
    #[serde(default)]
    pub is_feature: bool,
    #[serde(default)]
    pub url: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub description: String,
}

pub trait PureCmService: Send {
    fn projects(&self) -> ServiceResult<Vec<PcmProject>>;
    fn create_project(&self, project: &PcmProject) -> ServiceResult<PcmProject>;

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<PcmVersion>>;
    fn create_version(&self, version: &PcmVersion) -> ServiceResult<PcmVersion>;

    /// Tasks of a project modified strictly after `since`.
    fn tasks_changed_since(
        &self,
        project_id: u64,
        since: DateTime<Utc>,
    ) -> ServiceResult<Vec<PcmTask>>;
    fn task(&self, id: u64) -> ServiceResult<Option<PcmTask>>;
    fn create_task(&self, task: &PcmTask) -> ServiceResult<PcmTask>;
    fn update_task(&self, task: &PcmTask) -> ServiceResult<PcmTask>;

    fn users(&self) -> ServiceResult<Vec<PcmUser>>;
    fn user(&self, id: u64) -> ServiceResult<Option<PcmUser>>;
    fn create_user(&self, user: &PcmUser) -> ServiceResult<PcmUser>;
}
