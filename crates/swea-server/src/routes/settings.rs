use axum::extract::State;
use axum::Json;
use tracing::info;

use super::blocking;
use crate::error::AppError;
use crate::runner::RunnerSettings;
use crate::state::{provider_client, AppState};

/// GET /api/settings: current config with API keys masked.
pub async fn get_settings(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let settings = app.config.read().await.redacted()?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}

/// POST /api/settings: deep-merge a partial config, persist it and rebuild
/// the provider client. Server address and CORS changes apply on restart.
pub async fn update_settings(
    State(app): State<AppState>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut config = app.config.write().await;
    let mut updated = config.clone();
    updated.apply_update(&patch)?;
    let client = provider_client(&updated)?;

    {
        let root = app.root.clone();
        let to_save = updated.clone();
        blocking(move || to_save.save(&root)).await?;
    }

    app.runner.set_client(client).await;
    app.runner
        .set_settings(RunnerSettings::from_config(&updated))
        .await;
    *config = updated;
    info!("settings updated");
    Ok(Json(serde_json::json!({ "message": "Settings updated" })))
}
