pub mod agent;
pub mod events;
pub mod logs;
pub mod messages;
pub mod projects;
pub mod settings;
pub mod socket;
pub mod status;

use serde::Deserialize;

use crate::error::AppError;

/// Body or query carrying only a project name.
#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub project_name: Option<String>,
}

impl ProjectRequest {
    pub fn project_name(self) -> Result<String, AppError> {
        required(self.project_name, "project_name")
    }
}

/// Trimmed value of a required field; missing or blank is a 400.
pub fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::bad_request(format!("{field} is required"))),
    }
}

/// Run a store call on the blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> swea_core::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  demo ".into()), "x").unwrap(), "demo");
        assert!(required(Some("   ".into()), "x").is_err());
        assert!(required(None, "x").is_err());
    }
}
