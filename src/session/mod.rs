//! Session module - conversation state with TTL expiry
//!
//! This module provides the shared message-history store for RankMate:
//! - In-memory session storage keyed by [`SessionKey`], with async access
//! - A sliding inactivity TTL; expired sessions read as empty, which is
//!   indistinguishable from never having existed
//! - The per-session turn guard that rejects concurrent turns
//!
//! # Example
//!
//! ```
//! use rankmate::session::{Message, SessionKey, SessionStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SessionStore::with_default_ttl();
//!     let key = SessionKey::new("seo-bot", Some("acme"));
//!
//!     store.append(&key, Message::human("Hello!")).await;
//!     store.append(&key, Message::ai("Hi there!")).await;
//!
//!     assert_eq!(store.history(&key).await.len(), 2);
//! }
//! ```

pub mod types;

pub use types::{Message, Role, SessionKey};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RankError, Result};

/// Default inactivity TTL for sessions (one hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

struct SessionEntry {
    messages: Vec<Message>,
    touched: Instant,
}

/// Shared store for per-session message history.
///
/// The store is the only shared mutable resource in the runtime. Each key's
/// message sequence is only ever appended within one turn, so no locking finer
/// than the per-session in-progress flag is needed on top of the map lock.
///
/// # Thread Safety
///
/// Internally `Arc`-backed; clones share the same sessions and turn flags, so
/// the store can be handed to multiple runtimes and test observers.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store with a custom inactivity TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            ttl,
        }
    }

    /// Create a store with the default one-hour TTL.
    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }

    /// The configured inactivity TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the ordered message history for a session.
    ///
    /// Refreshes the TTL. An expired or unknown session returns an empty
    /// sequence; callers must not rely on any longer retention guarantee.
    pub async fn history(&self, key: &SessionKey) -> Vec<Message> {
        let storage_key = key.storage_key();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&storage_key) {
            Some(entry) if entry.touched.elapsed() <= self.ttl => {
                entry.touched = Instant::now();
                entry.messages.clone()
            }
            Some(_) => {
                debug!(session = %storage_key, "Session expired");
                sessions.remove(&storage_key);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Append a message to a session, creating the session if needed.
    ///
    /// Refreshes the TTL. An expired session is dropped and recreated
    /// transparently, starting from the appended message.
    pub async fn append(&self, key: &SessionKey, message: Message) {
        let storage_key = key.storage_key();
        let mut sessions = self.sessions.write().await;
        let expired = sessions
            .get(&storage_key)
            .map(|e| e.touched.elapsed() > self.ttl)
            .unwrap_or(false);
        if expired {
            sessions.remove(&storage_key);
        }
        let entry = sessions.entry(storage_key).or_insert_with(|| SessionEntry {
            messages: Vec::new(),
            touched: Instant::now(),
        });
        entry.messages.push(message);
        entry.touched = Instant::now();
    }

    /// Truncate a session's history, keeping only the first `len` messages.
    ///
    /// Used for message edits: everything appended after the edited point is
    /// dropped, so a re-submitted message sees a history consistent with the
    /// edit having always been there. Refreshes the TTL.
    pub async fn truncate(&self, key: &SessionKey, len: usize) {
        let storage_key = key.storage_key();
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&storage_key) {
            entry.messages.truncate(len);
            entry.touched = Instant::now();
        }
    }

    /// Number of messages currently held for a session (0 if expired/unknown).
    ///
    /// Does not refresh the TTL; this is an observer, not an interaction.
    pub async fn len(&self, key: &SessionKey) -> usize {
        let storage_key = key.storage_key();
        let sessions = self.sessions.read().await;
        sessions
            .get(&storage_key)
            .filter(|e| e.touched.elapsed() <= self.ttl)
            .map(|e| e.messages.len())
            .unwrap_or(0)
    }

    /// Remove a session entirely.
    pub async fn remove(&self, key: &SessionKey) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&key.storage_key());
    }

    /// Claim the in-progress flag for a session.
    ///
    /// Returns a guard that releases the flag when dropped. While a guard is
    /// live, further claims for the same session fail with
    /// [`RankError::TurnInProgress`] immediately; concurrent turns are
    /// rejected, not queued. Turns on different sessions are unaffected.
    pub fn begin_turn(&self, key: &SessionKey) -> Result<TurnGuard> {
        let storage_key = key.storage_key();
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| RankError::Session("turn flag lock poisoned".into()))?;
        if !in_flight.insert(storage_key.clone()) {
            return Err(RankError::TurnInProgress(storage_key));
        }
        Ok(TurnGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: storage_key,
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

/// RAII guard for a session's in-progress flag.
///
/// Dropping the guard releases the flag, including on early return or panic
/// inside a turn.
pub struct TurnGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}
