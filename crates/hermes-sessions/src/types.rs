use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hermes_core::{HistoryEntry, SessionKey, SessionSource};

/// Persistent state of one conversation.
///
/// Serialized as the per-session JSON blob under
/// `sessions/<platform>/<chat_id>[_<thread_id>].json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub key: SessionKey,
    pub source: SessionSource,
    /// Conversation history, append-only within a turn. Entries are opaque
    /// to the gateway; only the agent engine interprets them.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub turn_count: u32,
}

impl SessionContext {
    /// Fresh context with empty history.
    pub fn new(source: SessionSource) -> Self {
        let now = Utc::now();
        Self {
            key: source.session_key(),
            source,
            history: Vec::new(),
            created_at: now,
            last_activity_at: now,
            turn_count: 0,
        }
    }

    /// Bump the activity clock. `last_activity_at` never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }
}
