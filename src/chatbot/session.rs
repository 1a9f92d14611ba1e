//! Per-sender conversation history.
//!
//! Each sender gets its own async mutex so a slow completion for one sender
//! never blocks another. The outer map lock is only held for lookup/insert.
//! `tokio::sync::Mutex` is FIFO-fair, so waiters on one sender are served in
//! the order they asked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::chatbot::message::ChatTurn;

/// Maximum turns kept per sender. Older turns are evicted first.
pub const MAX_HISTORY: usize = 10;

type History = Arc<AsyncMutex<Vec<ChatTurn>>>;

/// Owns every sender's conversation history.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, History>>,
}

/// Exclusive access to one sender's history.
///
/// Held across a whole chat exchange so the user turn, the completion call and
/// the assistant turn cannot interleave with another message from the same sender.
pub struct SessionGuard {
    turns: OwnedMutexGuard<Vec<ChatTurn>>,
}

impl SessionGuard {
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        truncate(&mut self.turns);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a sender's history, creating it if absent.
    pub async fn lock(&self, sender: &str) -> SessionGuard {
        let history = self.get_or_create(sender);
        SessionGuard {
            turns: history.lock_owned().await,
        }
    }

    pub async fn append(&self, sender: &str, turn: ChatTurn) {
        self.lock(sender).await.push(turn);
    }

    /// Snapshot of a sender's history. Empty if the sender is unknown.
    pub async fn get(&self, sender: &str) -> Vec<ChatTurn> {
        match self.existing(sender) {
            Some(history) => history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Drop a sender's history. Returns whether there was anything to drop.
    pub async fn clear(&self, sender: &str) -> bool {
        let Some(history) = self.existing(sender) else {
            return false;
        };
        let mut turns = history.lock().await;
        let existed = !turns.is_empty();
        turns.clear();
        existed
    }

    fn existing(&self, sender: &str) -> Option<History> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(sender).cloned()
    }

    fn get_or_create(&self, sender: &str) -> History {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(sender.to_string()).or_default().clone()
    }
}

fn truncate(turns: &mut Vec<ChatTurn>) {
    if turns.len() > MAX_HISTORY {
        let excess = turns.len() - MAX_HISTORY;
        turns.drain(..excess);
    }
}
