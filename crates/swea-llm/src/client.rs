use async_trait::async_trait;

use crate::types::{ChatMessage, ChatOptions, ChatResponse};
use crate::Result;

/// A chat-completion provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `messages` to `model` and return the assistant's reply.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}
