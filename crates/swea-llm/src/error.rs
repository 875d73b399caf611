use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// HTTP status of the failed request, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Api { status, .. } => Some(*status),
            LlmError::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }
}
