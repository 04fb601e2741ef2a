//! Session-local submission state.
//!
//! Holds what one browser session has submitted so far. Never persisted:
//! the state lives in process memory and expires with the cache TTL. The
//! orchestrator is handed an owned [`SessionState`], mutates it through the
//! two operations below, and the handler writes it back; the in-flight
//! guard serializes this read-modify-write per session.

use crate::models::Lead;
use moka::future::Cache;
use serde::Serialize;
use std::time::Duration;

/// State owned by one session: the submitted flag and the leads captured
/// this session, in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    /// Whether this session has completed at least one submission.
    pub submitted: bool,
    /// Leads recorded this session, insertion order preserved, no dedup.
    pub leads: Vec<Lead>,
}

impl SessionState {
    /// Append a lead. Insertion order is preserved and duplicates are kept.
    pub fn add_lead(&mut self, lead: Lead) {
        self.leads.push(lead);
    }

    /// Set the submitted flag. Idempotent.
    pub fn set_submitted(&mut self, submitted: bool) {
        self.submitted = submitted;
    }
}

/// Process-local holder of per-session state, keyed by session id.
pub struct SessionStore {
    sessions: Cache<String, SessionState>,
}

impl SessionStore {
    /// Session lifetime mirrors a browser visit; expired entries simply
    /// start over with an empty state.
    pub fn new() -> Self {
        let sessions = Cache::builder()
            .time_to_idle(Duration::from_secs(1800))
            .max_capacity(100_000)
            .build();
        Self { sessions }
    }

    /// Current state for a session, or a fresh one for unknown ids.
    pub async fn load(&self, session_id: &str) -> SessionState {
        self.sessions
            .get(session_id)
            .await
            .unwrap_or_default()
    }

    /// Look up a session without creating one.
    pub async fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.get(session_id).await
    }

    /// Write a session's state back after a submission attempt.
    pub async fn save(&self, session_id: &str, state: SessionState) {
        self.sessions.insert(session_id.to_string(), state).await;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
