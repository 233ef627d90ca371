//! In-memory session store with bounded retention.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dentassist_config::SessionConfig;
use dentassist_core::error::SessionError;
use dentassist_core::session::{SessionId, SessionStore, Turn};
use tokio::time::Instant;
use tracing::debug;

/// Limits applied to stored sessions. `0` / `None` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Turns kept per session; the oldest are dropped first.
    pub max_turns: usize,
    /// Sessions idle for longer than this are evicted on the next access.
    pub idle_ttl: Option<Duration>,
    /// Live sessions kept; the least recently active is evicted first.
    pub max_sessions: usize,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_turns: 0,
            idle_ttl: None,
            max_sessions: 0,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for RetentionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            idle_ttl: (config.idle_ttl_secs > 0).then(|| Duration::from_secs(config.idle_ttl_secs)),
            max_sessions: config.max_sessions,
        }
    }
}

struct SessionEntry {
    turns: Vec<Turn>,
    last_active: Instant,
}

impl SessionEntry {
    fn new(now: Instant) -> Self {
        Self {
            turns: Vec::new(),
            last_active: now,
        }
    }
}

/// Sessions kept in a mutex-guarded map. The lock is only held for map
/// operations, never across an await.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    policy: RetentionPolicy,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_policy(RetentionPolicy::default())
    }

    pub fn with_policy(policy: RetentionPolicy) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionEntry>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|_| SessionError::Storage("session map lock poisoned".into()))
    }

    fn evict_idle(&self, sessions: &mut HashMap<SessionId, SessionEntry>, now: Instant) {
        let Some(ttl) = self.policy.idle_ttl else {
            return;
        };
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_active) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle sessions");
        }
    }

    /// Insert an empty session for `id`, making room under the session cap.
    fn insert_new(
        &self,
        sessions: &mut HashMap<SessionId, SessionEntry>,
        id: SessionId,
        now: Instant,
    ) {
        if self.policy.max_sessions > 0 {
            while sessions.len() >= self.policy.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_active)
                    .map(|(id, _)| id.clone());
                match oldest {
                    Some(oldest) => {
                        debug!(session_id = %oldest, "Evicted least recently active session");
                        sessions.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        sessions.insert(id, SessionEntry::new(now));
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_or_create(
        &self,
        id: Option<SessionId>,
    ) -> Result<(SessionId, Vec<Turn>), SessionError> {
        let id = id.unwrap_or_default();
        let now = Instant::now();
        let mut sessions = self.lock()?;
        self.evict_idle(&mut sessions, now);

        if let Some(entry) = sessions.get_mut(&id) {
            entry.last_active = now;
            return Ok((id, entry.turns.clone()));
        }

        self.insert_new(&mut sessions, id.clone(), now);
        Ok((id, Vec::new()))
    }

    async fn append(&self, id: &SessionId, turn: Turn) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut sessions = self.lock()?;
        self.evict_idle(&mut sessions, now);

        if !sessions.contains_key(id) {
            self.insert_new(&mut sessions, id.clone(), now);
        }
        let Some(entry) = sessions.get_mut(id) else {
            return Err(SessionError::Storage(format!("session {id} missing after insert")));
        };

        entry.turns.push(turn);
        entry.last_active = now;

        let max = self.policy.max_turns;
        if max > 0 && entry.turns.len() > max {
            let excess = entry.turns.len() - max;
            entry.turns.drain(..excess);
        }
        Ok(())
    }

    async fn history(&self, id: &SessionId) -> Result<Option<Vec<Turn>>, SessionError> {
        let mut sessions = self.lock()?;
        self.evict_idle(&mut sessions, Instant::now());
        Ok(sessions.get(id).map(|entry| entry.turns.clone()))
    }

    async fn len(&self) -> Result<usize, SessionError> {
        let mut sessions = self.lock()?;
        self.evict_idle(&mut sessions, Instant::now());
        Ok(sessions.len())
    }
}
