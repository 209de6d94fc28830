//! Registry of live proxied sessions
//!
//! Entries exist only while a session's forwarder runs. The [`SessionGuard`]
//! returned by [`SessionRegistry::register`] removes the entry when dropped,
//! however the session ends.

use crate::nonce::NonceTracker;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Diagnostic view of one live session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Process-unique session id
    pub id: u64,
    /// Node id captured from the first request, empty until then
    pub node_id: String,
    /// When the session was accepted
    pub started: Instant,
    /// The session's nonce tracker
    pub nonces: Arc<NonceTracker>,
}

#[derive(Debug)]
struct Entry {
    node_id: RwLock<String>,
    started: Instant,
    nonces: Arc<NonceTracker>,
}

/// Process-wide set of live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<u64, Arc<Entry>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session
    pub fn register(self: &Arc<Self>, nonces: Arc<NonceTracker>) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Arc::new(Entry {
            node_id: RwLock::new(String::new()),
            started: Instant::now(),
            nonces,
        });
        self.sessions.write().insert(id, Arc::clone(&entry));
        SessionGuard {
            id,
            entry,
            registry: Arc::clone(self),
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Snapshot of live sessions, ordered by id
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut out: Vec<SessionInfo> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: *id,
                node_id: entry.node_id.read().clone(),
                started: entry.started,
                nonces: Arc::clone(&entry.nonces),
            })
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Look up a live session
    pub fn get(&self, id: u64) -> Option<SessionInfo> {
        self.sessions.read().get(&id).map(|entry| SessionInfo {
            id,
            node_id: entry.node_id.read().clone(),
            started: entry.started,
            nonces: Arc::clone(&entry.nonces),
        })
    }

    fn remove(&self, id: u64) {
        self.sessions.write().remove(&id);
    }
}

/// Keeps a session registered; deregisters on drop
#[derive(Debug)]
pub struct SessionGuard {
    id: u64,
    entry: Arc<Entry>,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    /// Session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Record the node id once the first request arrives
    pub fn set_node_id(&self, node_id: &str) {
        *self.entry.node_id.write() = node_id.to_string();
    }

    /// Time since the session was accepted
    pub fn elapsed(&self) -> std::time::Duration {
        self.entry.started.elapsed()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
