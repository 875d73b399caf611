use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use swea_core::search::SearchEngine;
use tracing::warn;

use super::{blocking, required};
use crate::error::AppError;
use crate::runner::DispatchRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub project_name: Option<String>,
    pub message: Option<String>,
    pub base_model: Option<String>,
    pub search_engine: Option<String>,
}

impl AppState {
    /// Turn a client message into a dispatch request, filling model and
    /// search engine from the configured defaults.
    pub async fn dispatch_request(&self, body: MessageRequest) -> Result<DispatchRequest, AppError> {
        let project_name = required(body.project_name, "project_name")?;
        let message = required(body.message, "message")?;
        let config = self.config.read().await;
        let model_id = body
            .base_model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| config.defaults.model.clone());
        let search_engine =
            SearchEngine::resolve(body.search_engine.as_deref(), config.defaults.search_engine)?;
        Ok(DispatchRequest {
            project_name,
            message,
            model_id,
            search_engine,
        })
    }
}

/// POST /api/messages: dispatch a run and wait for its reply, bounded by
/// `timeouts.message_wait_secs`. Returns the project's messages either way.
pub async fn post_message(
    State(app): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = app.dispatch_request(body).await?;
    let wait = Duration::from_secs(app.config.read().await.timeouts.message_wait_secs);
    let project = req.project_name.clone();

    let ticket = app.runner.dispatch(req).await?;
    let run_id = ticket.run_id;
    let completed = match tokio::time::timeout(wait, ticket.wait()).await {
        Ok(Some(outcome)) => Some(outcome.completed),
        Ok(None) => None,
        Err(_) => {
            warn!(project = %project, run_id = %run_id, "run still in progress after wait timeout");
            None
        }
    };

    let projects = app.projects.clone();
    let messages = blocking(move || projects.list_messages(&project)).await?;
    Ok(Json(serde_json::json!({
        "messages": messages.unwrap_or_default(),
        "run_id": run_id,
        "completed": completed,
    })))
}
