//! `GeminiService` over the tracker's JSON API.

use tasklink_core::GeminiOptions;

use super::service::{
    GeminiIssue, GeminiLookup, GeminiPriority, GeminiProject, GeminiResolution, GeminiService,
    GeminiUser, GeminiVersion, IssueComment, IssueFilter, SourceControlFile,
};
use crate::error::ServiceResult;
use crate::http::JsonClient;

pub struct HttpGeminiService {
    client: JsonClient,
}

impl HttpGeminiService {
    pub fn new(options: &GeminiOptions) -> Self {
        let api = format!("{}/api", options.url.trim_end_matches('/'));
        Self {
            client: JsonClient::new(
                &api,
                vec![
                    ("X-Gemini-User", options.user.clone()),
                    ("X-Gemini-Password", options.password.clone()),
                ],
            ),
        }
    }
}

impl GeminiService for HttpGeminiService {
    fn projects(&self) -> ServiceResult<Vec<GeminiProject>> {
        self.client.get("projects")
    }

    fn create_project(
        &self,
        project: &GeminiProject,
        template_id: u64,
    ) -> ServiceResult<GeminiProject> {
        self.client
            .send("POST", &format!("projects?templateId={}", template_id), project)
    }

    fn versions(&self, project_id: u64) -> ServiceResult<Vec<GeminiVersion>> {
        self.client.get(&format!("projects/{}/versions", project_id))
    }

    fn create_version(&self, version: &GeminiVersion) -> ServiceResult<GeminiVersion> {
        self.client.send(
            "POST",
            &format!("projects/{}/versions", version.project_id),
            version,
        )
    }

    fn filtered_issues(&self, filter: &IssueFilter) -> ServiceResult<Vec<GeminiIssue>> {
        self.client.send("POST", "issues/filtered", filter)
    }

    fn issue(&self, id: u64) -> ServiceResult<Option<GeminiIssue>> {
        self.client.get_opt(&format!("issues/{}", id))
    }

    fn create_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue> {
        self.client.send("POST", "issues", issue)
    }

    fn update_issue(&self, issue: &GeminiIssue) -> ServiceResult<GeminiIssue> {
        self.client.send("PUT", &format!("issues/{}", issue.id), issue)
    }

    fn priorities(&self, project_id: u64) -> ServiceResult<Vec<GeminiPriority>> {
        self.client.get(&format!("projects/{}/priorities", project_id))
    }

    fn resolutions(&self) -> ServiceResult<Vec<GeminiResolution>> {
        self.client.get("resolutions")
    }

    fn issue_types(&self) -> ServiceResult<Vec<GeminiLookup>> {
        self.client.get("types")
    }

    fn issue_statuses(&self) -> ServiceResult<Vec<GeminiLookup>> {
        self.client.get("statuses")
    }

    fn issue_severities(&self) -> ServiceResult<Vec<GeminiLookup>> {
        self.client.get("severities")
    }

    fn user(&self, id: u64) -> ServiceResult<Option<GeminiUser>> {
        self.client.get_opt(&format!("users/{}", id))
    }

    fn user_by_name(&self, user_name: &str) -> ServiceResult<Option<GeminiUser>> {
        let found: Vec<GeminiUser> = self.client.get_query("users", &[("userName", user_name)])?;
        Ok(found.into_iter().find(|u| u.user_name == user_name))
    }

    fn create_user(&self, user: &GeminiUser) -> ServiceResult<GeminiUser> {
        self.client.send("POST", "users", user)
    }

    fn who_am_i(&self) -> ServiceResult<GeminiUser> {
        self.client.get("users/me")
    }

    fn create_comment(&self, comment: &IssueComment) -> ServiceResult<()> {
        self.client
            .send_unit("POST", &format!("issues/{}/comments", comment.issue_id), comment)
    }

    fn create_source_control_file(&self, file: &SourceControlFile) -> ServiceResult<()> {
        self.client
            .send_unit("POST", &format!("issues/{}/scm", file.issue_id), file)
    }
}
