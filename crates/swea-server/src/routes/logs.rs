use axum::extract::State;
use axum::Json;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/logs: server log file contents, empty when nothing was logged yet.
pub async fn get_logs(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let path = swea_core::paths::log_path(&app.root);
    let logs = blocking(move || swea_core::io::read_or_empty(&path)).await?;
    Ok(Json(serde_json::json!({ "logs": logs })))
}
