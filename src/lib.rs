//! Signal relay bot: forwards Signal messages to an OpenAI-compatible
//! chat-completion API and keeps a short conversation history per sender.

pub mod chatbot;
pub mod config;
