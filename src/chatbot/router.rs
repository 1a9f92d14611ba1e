//! Text command parsing and dispatch.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::chatbot::handlers::Handlers;

/// Commands understood over the text protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Chat,
    Clear,
    Models,
    Help,
}

impl Command {
    /// Every registered command, in help order.
    pub const ALL: [Command; 4] = [Command::Chat, Command::Clear, Command::Models, Command::Help];

    pub fn name(self) -> &'static str {
        match self {
            Command::Chat => "chat",
            Command::Clear => "clear",
            Command::Models => "models",
            Command::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Chat => "Chat with AI assistant",
            Command::Clear => "Clear conversation history",
            Command::Models => "List available AI models",
            Command::Help => "Show available commands",
        }
    }

    fn from_name(name: &str) -> Option<Command> {
        Command::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// A parsed inbound message: which command, and the text it operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub argument: String,
}

impl Invocation {
    fn chat(text: &str) -> Self {
        Self { command: Command::Chat, argument: text.to_string() }
    }
}

static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(!)?(chat|clear|models|help)\b\s*(.*)$").expect("command pattern is valid")
});

/// Work out which command a message invokes.
///
/// `!`-prefixed commands always match. Without the prefix, `chat <message>`
/// is a chat and the other commands only match as a bare word, so ordinary
/// sentences such as "help me with rust" still go to the model.
pub fn parse(text: &str) -> Invocation {
    let text = text.trim();

    let Some(caps) = COMMAND_PATTERN.captures(text) else {
        return Invocation::chat(text);
    };

    let prefixed = caps.get(1).is_some();
    let argument = caps.get(3).map_or("", |m| m.as_str().trim());
    let Some(command) = caps.get(2).and_then(|m| Command::from_name(m.as_str())) else {
        return Invocation::chat(text);
    };

    if prefixed || command == Command::Chat || argument.is_empty() {
        Invocation { command, argument: argument.to_string() }
    } else {
        Invocation::chat(text)
    }
}

/// Routes inbound text to a handler and returns the reply.
pub struct CommandRouter {
    handlers: Handlers,
}

impl CommandRouter {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    pub async fn dispatch(&self, sender: &str, text: &str) -> String {
        let invocation = parse(text);
        info!("➡️ {sender} → {}", invocation.command.name());

        match invocation.command {
            Command::Chat => self.handlers.chat(sender, &invocation.argument).await,
            Command::Clear => self.handlers.clear(sender).await,
            Command::Models => self.handlers.models(sender).await,
            Command::Help => self.handlers.help(),
        }
    }
}
