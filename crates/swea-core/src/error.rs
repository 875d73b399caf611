use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweaError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("invalid project name '{0}': must be 1-128 printable characters without path separators")]
    InvalidProjectName(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SweaError>;
