//! Conversation types shared with the HTTP surface.

use serde::{Deserialize, Serialize};
use vulnscope_llm::Message;

/// One turn as supplied by the client. Any role other than `user` is
/// treated as the model's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    /// Engine-side form of this turn.
    pub fn to_llm(&self) -> Message {
        if self.is_user() {
            Message::user(self.content.clone())
        } else {
            Message::assistant(self.content.clone())
        }
    }
}

/// Per-request generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 65536,
        }
    }
}

/// Outcome of one chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub conversation_id: String,
    pub content: String,
    /// Tool round-trips performed.
    pub tool_calls: u32,
}
