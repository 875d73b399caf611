//! `swea-llm`: chat-completion client used by the swea agent runner.
//!
//! # Architecture
//!
//! ```text
//! AgentRunner
//!     │  &[ChatMessage]
//!     ▼
//! dyn LlmClient        ← trait seam; tests inject scripted clients
//!     │
//!     ▼
//! OpenRouterClient     ← POST /api/v1/chat/completions, one request per call
//!     │
//!     ▼
//! ChatResponse         ← reply text + token usage
//! ```
//!
//! The client makes exactly one request per call: no retry, no
//! streaming. Failures come back as [`LlmError`] and the caller decides how to
//! degrade.

pub mod client;
pub mod error;
pub mod openrouter;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openrouter::OpenRouterClient;
pub use types::{ChatMessage, ChatOptions, ChatResponse, Role, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
