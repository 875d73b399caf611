use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use swea_core::SweaError;
use swea_llm::LlmError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(SweaError::Validation(msg.into()).into())
    }

    pub fn status(&self) -> StatusCode {
        if let Some(e) = self.0.downcast_ref::<SweaError>() {
            return match e {
                SweaError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
                SweaError::InvalidProjectName(_) | SweaError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                SweaError::Storage(_)
                | SweaError::Io(_)
                | SweaError::Yaml(_)
                | SweaError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if self.0.downcast_ref::<LlmError>().is_some() {
            return StatusCode::BAD_GATEWAY;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[test]
    fn project_not_found_maps_to_404() {
        let err = AppError(SweaError::ProjectNotFound("demo".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_project_name_maps_to_400() {
        let err = AppError(SweaError::InvalidProjectName("a/b".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let err = AppError::bad_request("message is required");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_error_maps_to_500() {
        let err = AppError(SweaError::Storage("corrupt".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn context_wrapped_core_error_keeps_status() {
        let err: anyhow::Error = SweaError::ProjectNotFound("demo".into()).into();
        let err = AppError(err.context("loading messages"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn provider_error_maps_to_502() {
        let err = AppError(LlmError::Timeout.into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unknown_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn response_body_contains_error_field() {
        let response = AppError::bad_request("project_name is required").into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "project_name is required");
    }
}
