//! Command handlers.
//!
//! Handlers hold no state of their own; conversation state lives in the
//! [`SessionStore`] and every call is a single request/response exchange.

use std::sync::Arc;

use tracing::info;

use crate::chatbot::completion::{CompletionClient, ModelSelection};
use crate::chatbot::message::ChatTurn;
use crate::chatbot::session::SessionStore;

pub const EMPTY_CHAT_REPLY: &str = "Please provide a message to chat with the AI.";
pub const CLEARED_REPLY: &str = "Conversation history cleared.";
pub const NOTHING_TO_CLEAR_REPLY: &str = "No conversation history to clear.";
pub const NO_MODELS_LISTED_REPLY: &str = "No models available or unable to fetch model list.";

pub const HELP_TEXT: &str = "Available commands:
!chat <message> - Chat with AI assistant
!clear - Clear conversation history
!models - List available models
!help - Show this help message

You can also send messages without commands for direct chat.";

pub struct Handlers {
    sessions: Arc<SessionStore>,
    client: Arc<CompletionClient>,
    model: ModelSelection,
}

impl Handlers {
    pub fn new(sessions: Arc<SessionStore>, client: Arc<CompletionClient>, model: ModelSelection) -> Self {
        Self { sessions, client, model }
    }

    /// Send `message` to the model with the sender's recent history.
    ///
    /// Both the user turn and the reply are recorded, including error replies.
    pub async fn chat(&self, sender: &str, message: &str) -> String {
        if message.is_empty() {
            return EMPTY_CHAT_REPLY.to_string();
        }

        info!("💬 Chat from {sender} ({} chars)", message.chars().count());

        let mut session = self.sessions.lock(sender).await;
        session.push(ChatTurn::user(message));

        let reply = self
            .client
            .complete(session.turns(), self.model.as_override())
            .await;

        session.push(ChatTurn::assistant(reply.clone()));
        reply
    }

    pub async fn clear(&self, sender: &str) -> String {
        if self.sessions.clear(sender).await {
            info!("🧹 Cleared history for {sender}");
            CLEARED_REPLY.to_string()
        } else {
            NOTHING_TO_CLEAR_REPLY.to_string()
        }
    }

    pub async fn models(&self, sender: &str) -> String {
        info!("📋 Model list requested by {sender}");
        let models = self.client.list_models().await;
        if models.is_empty() {
            return NO_MODELS_LISTED_REPLY.to_string();
        }

        let lines: Vec<String> = models.iter().map(|m| format!("• {m}")).collect();
        format!("Available models:\n{}", lines.join("\n"))
    }

    pub fn help(&self) -> String {
        HELP_TEXT.to_string()
    }
}
