//! Message types shared by the transport, the router and the completion API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
///
/// Serializes in the `{"role": ..., "content": ...}` shape the chat API expects,
/// so a history slice can go into a request body as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A text message received from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Opaque sender identity (phone number or account UUID).
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Short single-line preview for log output.
    pub fn preview(&self) -> String {
        let preview: String = self.text.chars().take(100).collect();
        preview.replace('\n', " ")
    }
}

/// A reply to be delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_as_api_message() {
        let json = serde_json::to_value(ChatTurn::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));

        let json = serde_json::to_value(ChatTurn::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        let msg = InboundMessage::new("+1", format!("line1\nline2 {}", "x".repeat(200)));
        let preview = msg.preview();
        assert_eq!(preview.chars().count(), 100);
        assert!(preview.starts_with("line1 line2"));
    }
}
