//! `PureCmService` over the PureCM server's REST gateway.

use chrono::{DateTime, SecondsFormat, Utc};

use tasklink_core::PureCmOptions;

use super::service::{PcmProject, PcmTask, PcmUser, PcmVersion, PureCmService};
use crate::error::ServiceResult;
use crate::http::JsonClient;

pub struct HttpPureCmService {
    client: JsonClient,
}

impl HttpPureCmService {
    pub fn new(options: &PureCmOptions) -> Self {
        let base = format!(
            "{}/repositories/{}",
            options.url.trim_end_matches('/'),
            options.repository
        );
        Self {
            client: JsonClient::new(
                &base,
                vec![("Authorization", format!("Bearer {}", options.token))],
            ),
        }
    }
}

impl PureCmService for HttpPureCmService {
    fn projects(&self) -> ServiceResult<Vec<PcmProject>> {
        self.client.get("projects")
    }

    fn create_project(&self, project: &PcmProject) -> ServiceResult<PcmProject> {
        self.client.send("POST", "projects", project)
    }

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<PcmVersion>> {
        self.client.get(&format!("projects/{}/versions", project_id))
    }

    fn create_version(&self, version: &PcmVersion) -> ServiceResult<PcmVersion> {
        self.client.send(
            "POST",
            &format!("projects/{}/versions", version.project_id),
            version,
        )
    }

    fn tasks_changed_since(
        &self,
        project_id: u64,
        since: DateTime<Utc>,
    ) -> ServiceResult<Vec<PcmTask>> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.client.get_query(
            &format!("projects/{}/tasks", project_id),
            &[("changedSince", since.as_str())],
        )
    }

    fn task(&self, id: u64) -> ServiceResult<Option<PcmTask>> {
        self.client.get_opt(&format!("tasks/{}", id))
    }

    fn create_task(&self, task: &PcmTask) -> ServiceResult<PcmTask> {
        self.client.send(
            "POST",
            &format!("projects/{}/tasks", task.project_id),
            task,
        )
    }

    fn update_task(&self, task: &PcmTask) -> ServiceResult<PcmTask> {
        self.client.send("PUT", &format!("tasks/{}", task.id), task)
    }

    fn users(&self) -> ServiceResult<Vec<PcmUser>> {
        self.client.get("users")
    }

    fn user(&self, id: u64) -> ServiceResult<Option<PcmUser>> {
        self.client.get_opt(&format!("users/{}", id))
    }

    fn create_user(&self, user: &PcmUser) -> ServiceResult<PcmUser> {
        self.client.send("POST", "users", user)
    }
}
