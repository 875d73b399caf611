use axum::extract::State;
use axum::Json;
use swea_core::search::SearchEngine;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status: liveness check.
pub async fn get_status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "server is running!" }))
}

/// GET /api/data: projects, configured models and available search engines.
pub async fn get_data(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let projects = app.projects.clone();
    let names = blocking(move || projects.list_projects()).await?;
    let config = app.config.read().await;
    let engines: Vec<&str> = SearchEngine::all().iter().map(|e| e.display_name()).collect();
    Ok(Json(serde_json::json!({
        "projects": names,
        "models": config.models,
        "default_model": config.defaults.model,
        "search_engines": engines,
        "default_search_engine": config.defaults.search_engine,
    })))
}
