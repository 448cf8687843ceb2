/// Streamable HTTP sessions
///
/// A session is created by `initialize` and named by the `Mcp-Session-Id`
/// header on every later request. Requests within one session are handled one
/// at a time; different sessions proceed independently. Sessions left idle
/// longer than the store's TTL are evicted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};

/// Per-session lifecycle.
///
/// `Idle -> Listening -> [Dispatching ->] Responding -> Idle`, and any state
/// may move to `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Dispatching,
    Responding,
    Closed,
}

impl SessionState {
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Listening)
            | (Listening, Dispatching)
            | (Listening, Responding)
            | (Dispatching, Responding)
            | (Responding, Idle) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    Unknown(String),
    #[error("session closed: {0}")]
    Closed(String),
    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    last_active: Mutex<Instant>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Idle),
            last_active: Mutex::new(Instant::now()),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transition(&self, to: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Closed {
            return Err(SessionError::Closed(self.id.clone()));
        }
        if !state.can_transition_to(to) {
            return Err(SessionError::InvalidTransition { from: *state, to });
        }
        debug!(session = %self.id, from = ?*state, to = ?to, "session transition");
        *state = to;
        Ok(())
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Close the session if it is idle and has been for at least `ttl`.
    /// Returns whether the session is now closed.
    fn expire(&self, ttl: Duration) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SessionState::Closed => true,
            SessionState::Idle if self.idle_for() >= ttl => {
                *state = SessionState::Closed;
                true
            }
            _ => false,
        }
    }

    /// Wait for the previous request on this session to finish, then start a
    /// new one. The returned guard holds the session until it is dropped.
    pub async fn begin(self: &Arc<Self>) -> Result<SessionGuard, SessionError> {
        let permit = Arc::clone(&self.gate).lock_owned().await;
        self.transition(SessionState::Listening)?;
        self.touch();
        Ok(SessionGuard {
            session: Arc::clone(self),
            _permit: permit,
        })
    }
}

/// Exclusive hold on a session for the duration of one request.
///
/// Dropping the guard after `Responding` returns the session to `Idle`.
/// Dropping it earlier means the request was abandoned (client went away), and
/// the session is closed.
pub struct SessionGuard {
    session: Arc<Session>,
    _permit: OwnedMutexGuard<()>,
}

impl SessionGuard {
    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Move the session on. A session closed underneath the request (by
    /// `DELETE` or eviction) stays closed.
    pub fn advance(&self, to: SessionState) {
        match self.session.transition(to) {
            Ok(()) => {}
            Err(SessionError::Closed(_)) => {
                debug!(session = %self.session.id, to = ?to, "session closed during request");
            }
            Err(e) => {
                error!(session = %self.session.id, error = %e, "session state violation");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let next = match self.session.state() {
            SessionState::Responding => SessionState::Idle,
            SessionState::Closed => return,
            _ => SessionState::Closed,
        };
        if next == SessionState::Closed {
            info!(session = %self.session.id, "request abandoned, closing session");
        } else {
            self.session.touch();
        }
        self.advance(next);
    }
}

/// Table of live sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Start a new session. Sessions idle past the TTL are swept first.
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        let active = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let before = sessions.len();
            sessions.retain(|_, s| !s.expire(self.idle_ttl));
            let evicted = before - sessions.len();
            if evicted > 0 {
                info!(evicted, "idle sessions evicted");
            }
            sessions.insert(session.id.clone(), Arc::clone(&session));
            sessions.len()
        };
        info!(session = %session.id, active, "session created");
        session
    }

    /// Look up a live session. Sessions found closed or idle past the TTL are
    /// evicted.
    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::Unknown(id.to_string()))?;

        if session.expire(self.idle_ttl) {
            self.remove(id);
            return Err(SessionError::Closed(id.to_string()));
        }
        Ok(session)
    }

    /// Close and forget a session. Requests still in flight on it finish, but
    /// later requests naming it are rejected.
    pub fn close(&self, id: &str) -> Result<(), SessionError> {
        let session = self
            .remove(id)
            .ok_or_else(|| SessionError::Unknown(id.to_string()))?;
        session.transition(SessionState::Closed)?;
        let age = Utc::now() - session.created_at;
        info!(session = %id, age_secs = age.num_seconds(), "session closed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}
