use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names pushed to realtime clients.
pub mod events {
    pub const INFO: &str = "info";
    pub const AGENT_STATE: &str = "agent-state";
    pub const SERVER_MESSAGE: &str = "server-message";
    pub const TOKENS: &str = "tokens";
    pub const SOCKET_RESPONSE: &str = "socket_response";
}

pub const CHANNEL_CAPACITY: usize = 256;

/// A named event with a JSON payload. Same shape on the WebSocket in both
/// directions and as the SSE `data:` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ChannelEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// `info` event carrying a warning or error notice.
    pub fn info(kind: InfoKind, message: impl Into<String>) -> Self {
        Self::new(
            events::INFO,
            serde_json::json!({ "type": kind.as_str(), "message": message.into() }),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Warning,
    Error,
}

impl InfoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InfoKind::Warning => "warning",
            InfoKind::Error => "error",
        }
    }
}

/// Broadcast fan-out to every connected client. Clients that connect after an
/// event was sent never see it; lagging receivers lose the oldest events.
#[derive(Clone)]
pub struct Channel {
    tx: broadcast::Sender<ChannelEvent>,
}

impl Channel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send to all current subscribers. Returns how many received it.
    pub fn send(&self, event: ChannelEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn emit(&self, event: &str, data: serde_json::Value) -> usize {
        self.send(ChannelEvent::new(event, data))
    }

    pub fn emit_info(&self, kind: InfoKind, message: impl Into<String>) -> usize {
        self.send(ChannelEvent::info(kind, message))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}
