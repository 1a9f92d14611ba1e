//! Chatbot module - relays Signal messages to a chat-completion API.

pub mod completion;
pub mod handlers;
pub mod message;
pub mod router;
pub mod service;
pub mod session;
pub mod signal;
pub mod transport;


pub use completion::{CompletionClient, ModelSelection};
pub use handlers::Handlers;
pub use message::{ChatTurn, InboundMessage, OutboundMessage, Role};
pub use router::{Command, CommandRouter};
pub use service::BotService;
pub use session::{SessionStore, MAX_HISTORY};
pub use signal::SignalClient;
pub use transport::{Transport, TransportError};
