use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Timeout for ordinary API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `POST /api/messages` waits for the run server-side, so chat needs longer.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(180);

/// Blocking JSON client for the swea server API.
pub struct ApiClient {
    base: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn get(&self, path: &str) -> Result<serde_json::Value> {
        let req = self.agent.get(&self.url(path));
        self.finish(path, req.call())
    }

    pub fn get_query(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let mut req = self.agent.get(&self.url(path));
        for (k, v) in query {
            req = req.query(k, v);
        }
        self.finish(path, req.call())
    }

    pub fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let req = self.agent.post(&self.url(path));
        self.finish(path, req.send_json(body))
    }

    /// POST with only `project_name` in the body.
    pub fn post_project(&self, path: &str, project: &str) -> Result<serde_json::Value> {
        self.post(path, serde_json::json!({ "project_name": project }))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn finish(
        &self,
        path: &str,
        result: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<serde_json::Value> {
        match result {
            Ok(resp) => resp
                .into_json()
                .with_context(|| format!("invalid JSON from {path}")),
            Err(ureq::Error::Status(code, resp)) => {
                let body: Option<serde_json::Value> = resp.into_json().ok();
                let message = body
                    .as_ref()
                    .and_then(|b| b["error"].as_str())
                    .unwrap_or("request failed")
                    .to_string();
                Err(anyhow!("{message} (HTTP {code})"))
            }
            Err(ureq::Error::Transport(t)) => Err(anyhow!(
                "cannot reach swea server at {}: {t}\n\
                 Start it with `swea serve` or pass --server.",
                self.base
            )),
        }
    }
}
