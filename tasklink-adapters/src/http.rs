//! Shared plumbing for the JSON/HTTP service clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};

const TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("tasklink/", env!("CARGO_PKG_VERSION"));

/// Thin JSON client: one base URL, fixed headers, no retries.
pub(crate) struct JsonClient {
    agent: ureq::Agent,
    base: String,
    headers: Vec<(&'static str, String)>,
}

impl JsonClient {
    pub(crate) fn new(base: &str, headers: Vec<(&'static str, String)>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            base: base.trim_end_matches('/').to_owned(),
            headers,
        }
    }

    pub(crate) fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, &format!("{}/{}", self.base, path))
            .set("Accept", "application/json")
            .set("User-Agent", USER_AGENT);
        for (name, value) in &self.headers {
            req = req.set(name, value);
        }
        req
    }

    pub(crate) fn get<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        read(self.request("GET", path).call())
    }

    pub(crate) fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ServiceResult<T> {
        let mut req = self.request("GET", path);
        for (name, value) in query {
            req = req.query(name, value);
        }
        read(req.call())
    }

    /// `GET` that maps 404 to `None`.
    pub(crate) fn get_opt<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<Option<T>> {
        match self.request("GET", path).call() {
            Err(ureq::Error::Status(404, _)) => Ok(None),
            other => read(other).map(Some),
        }
    }

    pub(crate) fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        read(self.request(method, path).send_json(body))
    }

    /// Like [`JsonClient::send`] for endpoints with no meaningful response body.
    pub(crate) fn send_unit<B: Serialize>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> ServiceResult<()> {
        self.request(method, path)
            .send_json(body)
            .map(|_| ())
            .map_err(status_error)
    }
}

fn read<T: DeserializeOwned>(response: Result<ureq::Response, ureq::Error>) -> ServiceResult<T> {
    match response {
        Ok(resp) => resp
            .into_json()
            .map_err(|e| ServiceError::Decode(e.to_string())),
        Err(e) => Err(status_error(e)),
    }
}

fn status_error(err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(401 | 403, _) => ServiceError::Unauthorized,
        ureq::Error::Status(code @ (400 | 409 | 422), resp) => {
            let body = resp.into_string().unwrap_or_default();
            ServiceError::Rejected(format!("HTTP {}: {}", code, body))
        }
        ureq::Error::Status(code, resp) => ServiceError::Status {
            code,
            body: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => ServiceError::Transport(t.to_string()),
    }
}
