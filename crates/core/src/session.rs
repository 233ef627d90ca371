//! Session domain types and the session store abstraction.
//!
//! A session is an ordered, append-only list of turns scoped by an opaque
//! identifier. The store is injected into the request layer; the agent never
//! touches it directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::message::{Message, Role};

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// A fresh random (UUID v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded message of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Replay this turn as a model message.
    pub fn to_message(&self) -> Message {
        match self.role {
            Role::Assistant => Message::assistant(&self.content),
            _ => Message::user(&self.content),
        }
    }
}

/// Storage for session histories.
///
/// Implementations must keep turns in append order and must be safe to
/// share across request handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable backend name (e.g. "in_memory").
    fn name(&self) -> &str;

    /// Resolve `id` (generating one when absent) and return its current
    /// history. Unknown ids start a new, empty session.
    async fn get_or_create(
        &self,
        id: Option<SessionId>,
    ) -> Result<(SessionId, Vec<Turn>), SessionError>;

    /// Append a turn, creating the session if it does not exist.
    async fn append(&self, id: &SessionId, turn: Turn) -> Result<(), SessionError>;

    /// The history of an existing session.
    async fn history(&self, id: &SessionId) -> Result<Option<Vec<Turn>>, SessionError>;

    /// Number of live sessions.
    async fn len(&self) -> Result<usize, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn turn_replays_as_message() {
        let msg = Turn::assistant(". **Pick one!**").to_message();
        assert_eq!(msg.role, Role::Assistant);
        let msg = Turn::user("hello").to_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hello");
    }
}
