use serde::Serialize;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> Option<&'static str>;
}

/// A chat line broadcast to every listener of a channel.
/// `user` and `text` must already be sanitized by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
        }
    }

    pub fn joined(user: impl Into<String>) -> Self {
        Self::new(user, "joined the chat")
    }

    pub fn left(user: impl Into<String>) -> Self {
        Self::new(user, "left the chat")
    }

}

impl EventType for ChatMessage {
    // Chat lines go out as unnamed `message` events
    fn event_type(&self) -> Option<&'static str> {
        None
    }
}

/// Keep-alive sent by the heartbeat. Its payload reads like a chat line from
/// `system`, but it is always delivered as a named `ping` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ping(ChatMessage);

impl Ping {
    pub fn new() -> Self {
        Self(ChatMessage::new("system", "ping"))
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self::new()
    }
}

impl EventType for Ping {
    fn event_type(&self) -> Option<&'static str> {
        Some("ping")
    }
}

/// Snapshot of who is currently listening on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub user_count: usize,
    pub users: Vec<String>,
}

impl EventType for Presence {
    fn event_type(&self) -> Option<&'static str> {
        Some("count")
    }
}
