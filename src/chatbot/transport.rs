//! Messaging transport abstraction.

use async_trait::async_trait;

use crate::chatbot::message::{InboundMessage, OutboundMessage};

/// A bidirectional text channel to end users.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch messages that arrived since the last call. May return an empty batch.
    async fn receive(&self) -> Result<Vec<InboundMessage>, TransportError>;

    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

#[derive(Debug)]
pub enum TransportError {
    Http(String),
    Status { status: u16, body: String },
    Parse(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "HTTP error: {e}"),
            TransportError::Status { status, body } => write!(f, "gateway returned {status}: {body}"),
            TransportError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}
