use axum::extract::{Query, State};
use axum::Json;

use super::{blocking, ProjectRequest};
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/is-agent-active
pub async fn is_agent_active(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    let states = app.states.clone();
    let active = blocking(move || states.is_agent_active(&name)).await?;
    Ok(Json(serde_json::json!({ "is_active": active })))
}

/// POST /api/get-agent-state: `{"state": null}` when the project never ran.
pub async fn get_agent_state(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    let states = app.states.clone();
    let state = blocking(move || states.get_latest(&name)).await?;
    Ok(Json(serde_json::json!({ "state": state })))
}

/// POST /api/stop-agent
pub async fn stop_agent(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    let stopped = app.runner.stop(&name).await?;
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

/// GET /api/get-browser-session?project_name=
pub async fn get_browser_session(
    State(app): State<AppState>,
    Query(query): Query<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = query.project_name()?;
    let states = app.states.clone();
    let latest = blocking(move || states.get_latest(&name)).await?;
    Ok(Json(serde_json::json!({
        "session": latest.and_then(|s| s.browser_session)
    })))
}

/// GET /api/get-terminal-session?project_name=
pub async fn get_terminal_session(
    State(app): State<AppState>,
    Query(query): Query<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = query.project_name()?;
    let states = app.states.clone();
    let latest = blocking(move || states.get_latest(&name)).await?;
    Ok(Json(serde_json::json!({
        "terminal_state": latest.and_then(|s| s.terminal_session)
    })))
}

/// GET /api/token-usage?project_name=
pub async fn get_token_usage(
    State(app): State<AppState>,
    Query(query): Query<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = query.project_name()?;
    let states = app.states.clone();
    let tokens = blocking(move || states.get_latest_token_usage(&name)).await?;
    Ok(Json(serde_json::json!({ "token_usage": tokens })))
}
