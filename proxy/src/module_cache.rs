//! Module cache adapter
//!
//! [`FetchingModuleCache`] drives a [`ModuleFetcher`] and remembers the
//! outcome per module key:
//!
//! ```text
//!            resolve()                fetch ok
//!   (none) ───────────► Pending ─────────────────► Ready
//!                          │
//!                          │ fetch err
//!                          ▼
//!                       Failed ── failure_ttl elapsed ──► (none)
//! ```
//!
//! At most one fetch runs per key. Callers arriving while a fetch is in
//! flight wait on the same outcome for up to `wait` and get `Pending` after.

use crate::config::ModuleCacheConfig;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use silta_core::{ArtifactDescriptor, FetchError, ModuleCache, ModuleFetcher, ModuleRef, Resolution};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result published to waiters when a fetch finishes
type Outcome = Option<Result<ArtifactDescriptor, String>>;

enum Entry {
    Pending {
        id: u64,
        outcome: watch::Receiver<Outcome>,
        task: AbortHandle,
    },
    Ready(ArtifactDescriptor),
    Failed {
        reason: String,
        at: Instant,
    },
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

/// [`ModuleCache`] backed by a [`ModuleFetcher`]
pub struct FetchingModuleCache {
    fetcher: Arc<dyn ModuleFetcher>,
    entries: Entries,
    next_id: AtomicU64,
    wait: Duration,
    failure_ttl: Duration,
}

impl FetchingModuleCache {
    /// Create a cache with explicit timings
    pub fn new(fetcher: Arc<dyn ModuleFetcher>, wait: Duration, failure_ttl: Duration) -> Self {
        Self {
            fetcher,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            wait,
            failure_ttl,
        }
    }

    /// Create a cache from configuration
    pub fn from_config(fetcher: Arc<dyn ModuleFetcher>, config: &ModuleCacheConfig) -> Self {
        Self::new(fetcher, config.wait, config.failure_ttl)
    }

    /// Number of keys with any state
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is cached or in flight
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Look up the entry for `module`, starting a fetch if there is none
    ///
    /// Returns the final resolution if one is known, or a receiver to wait on.
    fn lookup_or_start(&self, module: &ModuleRef) -> Result<Resolution, watch::Receiver<Outcome>> {
        let key = module.cache_key().to_string();
        let mut entries = self.entries.lock();

        match entries.get(&key) {
            Some(Entry::Ready(artifact)) => return Ok(Resolution::Ready(artifact.clone())),
            Some(Entry::Failed { reason, at }) if at.elapsed() < self.failure_ttl => {
                return Ok(Resolution::Failed(reason.clone()));
            }
            Some(Entry::Pending { outcome, .. }) => return Err(outcome.clone()),
            Some(Entry::Failed { .. }) | None => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let fetcher = Arc::clone(&self.fetcher);
        let shared = Arc::clone(&self.entries);
        let task_key = key.clone();
        let module = module.clone();

        debug!(
            uri = %module.uri,
            resource = %module.resource_name,
            fetcher = fetcher.name(),
            "Starting module fetch"
        );

        let task = tokio::spawn(async move {
            let result = fetcher.fetch(&module).await;
            let outcome = {
                let mut entries = shared.lock();
                // A cleanup may have replaced or dropped our entry meanwhile
                let current = matches!(
                    entries.get(&task_key),
                    Some(Entry::Pending { id: current, .. }) if *current == id
                );
                match result {
                    Ok(artifact) => {
                        info!(uri = %module.uri, path = %artifact.filename(), "Module ready");
                        if current {
                            entries.insert(task_key, Entry::Ready(artifact.clone()));
                        }
                        Ok(artifact)
                    }
                    Err(e) => {
                        let reason = failure_reason(&module, &e);
                        warn!(uri = %module.uri, error = %e, "Module fetch failed");
                        if current {
                            entries.insert(
                                task_key,
                                Entry::Failed {
                                    reason: reason.clone(),
                                    at: Instant::now(),
                                },
                            );
                        }
                        Err(reason)
                    }
                }
            };
            let _ = tx.send(Some(outcome));
        });

        entries.insert(
            key,
            Entry::Pending {
                id,
                outcome: rx.clone(),
                task: task.abort_handle(),
            },
        );
        Err(rx)
    }
}

fn failure_reason(module: &ModuleRef, err: &FetchError) -> String {
    if module.resource_name.is_empty() {
        format!("{}: {err}", module.uri)
    } else {
        format!("{} ({}): {err}", module.resource_name, module.uri)
    }
}

#[async_trait]
impl ModuleCache for FetchingModuleCache {
    fn name(&self) -> &'static str {
        "fetching"
    }

    async fn resolve(&self, module: &ModuleRef) -> Resolution {
        let mut rx = match self.lookup_or_start(module) {
            Ok(resolution) => return resolution,
            Err(rx) => rx,
        };

        let waited = tokio::time::timeout(self.wait, async {
            rx.wait_for(|outcome| outcome.is_some())
                .await
                .map(|outcome| outcome.clone())
        })
        .await;

        match waited {
            Ok(Ok(Some(Ok(artifact)))) => Resolution::Ready(artifact),
            Ok(Ok(Some(Err(reason)))) => Resolution::Failed(reason),
            // Sender dropped without a value means cleanup aborted the fetch
            Ok(Err(_)) | Ok(Ok(None)) | Err(_) => Resolution::Pending,
        }
    }

    fn cleanup(&self) {
        let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        let mut aborted = 0usize;
        for entry in drained {
            if let Entry::Pending { task, .. } = entry {
                task.abort();
                aborted += 1;
            }
        }
        debug!(aborted, "Module cache cleaned up");
    }
}

impl std::fmt::Debug for FetchingModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchingModuleCache")
            .field("fetcher", &self.fetcher.name())
            .field("entries", &self.len())
            .field("wait", &self.wait)
            .field("failure_ttl", &self.failure_ttl)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Fetcher for `file://` URIs
///
/// The module already lives on local disk, so "fetching" means checking that
/// the path is a regular file. Checksums are not verified here.
#[derive(Debug, Default, Clone)]
pub struct FileFetcher;

impl FileFetcher {
    /// Create a file fetcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModuleFetcher for FileFetcher {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, module: &ModuleRef) -> Result<ArtifactDescriptor, FetchError> {
        let path = match module.uri.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None => {
                let scheme = module.scheme().unwrap_or("none");
                return Err(FetchError::UnsupportedScheme(scheme.to_string()));
            }
        };

        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(FetchError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(ArtifactDescriptor::new(path))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Swappable handle
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide, swappable reference to the active module cache
#[derive(Clone)]
pub struct ModuleCacheHandle {
    current: Arc<RwLock<Arc<dyn ModuleCache>>>,
}

impl ModuleCacheHandle {
    /// Wrap a cache backend
    pub fn new(cache: Arc<dyn ModuleCache>) -> Self {
        Self {
            current: Arc::new(RwLock::new(cache)),
        }
    }

    /// Backend in use right now
    pub fn get(&self) -> Arc<dyn ModuleCache> {
        Arc::clone(&self.current.read())
    }

    /// Install a new backend, returning the previous one
    pub fn replace(&self, cache: Arc<dyn ModuleCache>) -> Arc<dyn ModuleCache> {
        std::mem::replace(&mut *self.current.write(), cache)
    }
}

impl std::fmt::Debug for ModuleCacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCacheHandle")
            .field("backend", &self.current.read().name())
            .finish()
    }
}

// ==== TESTS ====
