//! Per-type nonce bookkeeping for one proxied session
//!
//! Two cells per type URL:
//!
//! ```text
//! upstream response ──► downstream      record_sent(type, nonce)
//! ACK/NACK (or synthesized NACK) ──► upstream   record_processed(type, nonce)
//! ```
//!
//! `sent` has a single writer, the response loop. `processed` has two: the
//! request loop records forwarded ACKs and NACKs, and the response loop
//! records the NACKs it synthesizes for extension configs it cannot localize.
//! Stores are serialized by the cell's write lock, so the last store wins and
//! the generation still moves once per change. Any number of diagnostic
//! readers may load concurrently. Callers can observe "a new response was
//! handled" through the generation without comparing strings.

use parking_lot::RwLock;
use silta_core::DeltaDiscoveryRequest;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomically replaced nonce value with a change counter
#[derive(Debug, Default)]
pub struct NonceCell {
    generation: AtomicU64,
    value: RwLock<Arc<str>>,
}

impl NonceCell {
    /// Create an empty cell (generation 0)
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            value: RwLock::new(Arc::from("")),
        }
    }

    /// Current nonce; empty if nothing was stored yet
    pub fn load(&self) -> Arc<str> {
        Arc::clone(&self.value.read())
    }

    /// Store a nonce
    ///
    /// Returns `true` if the value changed. Storing the current value again
    /// leaves the generation untouched.
    pub fn store(&self, nonce: &str) -> bool {
        let mut value = self.value.write();
        if value.as_ref() == nonce {
            return false;
        }
        *value = Arc::from(nonce);
        // Bumped under the write lock so generation and value never disagree
        self.generation.fetch_add(1, Ordering::Release);
        true
    }

    /// Number of distinct values stored so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Nonce state for one type URL
#[derive(Debug, Default)]
pub struct NonceRecord {
    /// Last nonce handed to the downstream send path
    pub sent: NonceCell,
    /// Last nonce acknowledged or rejected toward upstream
    pub processed: NonceCell,
}

/// How a downstream request relates to what we last sent for its type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// No response nonce: a new subscription or subscription change
    Initial,
    /// Acknowledges the most recent response
    Ack,
    /// Rejects a response (carries error detail)
    Nack,
    /// Echoes a nonce that is not the latest one sent
    Stale,
}

impl RequestKind {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Initial => "initial",
            RequestKind::Ack => "ack",
            RequestKind::Nack => "nack",
            RequestKind::Stale => "stale",
        }
    }
}

/// Point-in-time view of one type URL's record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceSnapshot {
    /// Type URL
    pub type_url: String,
    /// Last nonce sent downstream
    pub sent: Arc<str>,
    /// Generation of `sent`
    pub sent_generation: u64,
    /// Last nonce processed toward upstream
    pub processed: Arc<str>,
    /// Generation of `processed`
    pub processed_generation: u64,
}

/// Session-scoped nonce tracker keyed by type URL
#[derive(Debug, Default)]
pub struct NonceTracker {
    types: RwLock<HashMap<String, Arc<NonceRecord>>>,
}

impl NonceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, type_url: &str) -> Arc<NonceRecord> {
        if let Some(record) = self.types.read().get(type_url) {
            return Arc::clone(record);
        }
        let mut types = self.types.write();
        Arc::clone(types.entry(type_url.to_string()).or_default())
    }

    fn existing(&self, type_url: &str) -> Option<Arc<NonceRecord>> {
        self.types.read().get(type_url).cloned()
    }

    /// Remember the nonce of a response just handed downstream
    pub fn record_sent(&self, type_url: &str, nonce: &str) -> bool {
        self.record(type_url).sent.store(nonce)
    }

    /// Last nonce sent downstream for `type_url`
    pub fn current(&self, type_url: &str) -> Option<Arc<str>> {
        self.existing(type_url)
            .map(|r| r.sent.load())
            .filter(|n| !n.is_empty())
    }

    /// Remember the nonce of an ACK/NACK just handed upstream
    pub fn record_processed(&self, type_url: &str, nonce: &str) -> bool {
        self.record(type_url).processed.store(nonce)
    }

    /// Last nonce acknowledged or rejected toward upstream for `type_url`
    pub fn last_processed(&self, type_url: &str) -> Option<Arc<str>> {
        self.existing(type_url)
            .map(|r| r.processed.load())
            .filter(|n| !n.is_empty())
    }

    /// Generation of the sent cell (0 if the type was never seen)
    pub fn sent_generation(&self, type_url: &str) -> u64 {
        self.existing(type_url)
            .map(|r| r.sent.generation())
            .unwrap_or(0)
    }

    /// Generation of the processed cell (0 if the type was never seen)
    pub fn processed_generation(&self, type_url: &str) -> u64 {
        self.existing(type_url)
            .map(|r| r.processed.generation())
            .unwrap_or(0)
    }

    /// Classify a downstream request against the last response sent for its type
    pub fn classify(&self, request: &DeltaDiscoveryRequest) -> RequestKind {
        if request.error_detail.is_some() {
            return RequestKind::Nack;
        }
        if request.response_nonce.is_empty() {
            return RequestKind::Initial;
        }
        match self.current(&request.type_url) {
            Some(current) if current.as_ref() == request.response_nonce => RequestKind::Ack,
            _ => RequestKind::Stale,
        }
    }

    /// Snapshot every tracked type URL
    pub fn snapshot(&self) -> Vec<NonceSnapshot> {
        let types = self.types.read();
        let mut out: Vec<NonceSnapshot> = types
            .iter()
            .map(|(type_url, record)| NonceSnapshot {
                type_url: type_url.clone(),
                sent: record.sent.load(),
                sent_generation: record.sent.generation(),
                processed: record.processed.load(),
                processed_generation: record.processed.generation(),
            })
            .collect();
        out.sort_by(|a, b| a.type_url.cmp(&b.type_url));
        out
    }
}
