use axum::extract::State;
use axum::Json;
use swea_core::SweaError;

use super::{blocking, ProjectRequest};
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/create-project: idempotent.
pub async fn create_project(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    let projects = app.projects.clone();
    let created = {
        let name = name.clone();
        blocking(move || projects.create_project(&name)).await?
    };
    let message = if created {
        format!("Project '{name}' created")
    } else {
        format!("Project '{name}' already exists")
    };
    Ok(Json(serde_json::json!({ "message": message, "created": created })))
}

/// POST /api/delete-project: stops any active run, then removes the project
/// and its agent state history.
pub async fn delete_project(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    app.runner.stop(&name).await?;
    let projects = app.projects.clone();
    let states = app.states.clone();
    {
        let name = name.clone();
        blocking(move || {
            projects.delete_project(&name)?;
            states.clear(&name)
        })
        .await?;
    }
    Ok(Json(serde_json::json!({
        "message": format!("Project '{name}' deleted")
    })))
}

/// POST /api/get-messages: 404 for an unknown project, `[]` for an empty one.
pub async fn get_messages(
    State(app): State<AppState>,
    Json(body): Json<ProjectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.project_name()?;
    let projects = app.projects.clone();
    let messages = {
        let name = name.clone();
        blocking(move || projects.list_messages(&name)).await?
    };
    let messages = messages.ok_or(SweaError::ProjectNotFound(name))?;
    Ok(Json(serde_json::json!({ "messages": messages })))
}
