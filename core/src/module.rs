//! Module cache contract
//!
//! The proxy never fetches Wasm modules itself. It hands a [`ModuleRef`] to a
//! [`ModuleCache`] and acts on the [`Resolution`]:
//!
//! ```text
//! Ready(artifact) ──► rewrite remote code source to a local file
//! Pending         ──► withhold the resource from this response
//! Failed(reason)  ──► NACK the response upstream
//! ```
//!
//! Caches are shared process-wide and must be safe to call from many
//! sessions at once. How a cache deduplicates in-flight fetches is its own
//! business; the proxy only relies on `resolve` returning promptly.

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reference to a remote Wasm module found in an extension config
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    /// Remote location (`https://`, `oci://`, `file://` ...)
    pub uri: String,
    /// Expected sha256 of the module, hex encoded; may be empty
    pub sha256: String,
    /// Name of the xDS resource that referenced the module
    pub resource_name: String,
    /// Version of the xDS resource that referenced the module
    pub resource_version: String,
}

impl ModuleRef {
    /// Create a reference with only a URI
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            sha256: String::new(),
            resource_name: String::new(),
            resource_version: String::new(),
        }
    }

    /// Set the expected checksum
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = sha256.into();
        self
    }

    /// Record which resource referenced the module
    pub fn for_resource(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self.resource_version = version.into();
        self
    }

    /// Key identifying the module content
    ///
    /// Two resources pointing at the same checksum share one cache entry even
    /// if their URIs differ.
    pub fn cache_key(&self) -> &str {
        if self.sha256.is_empty() {
            &self.uri
        } else {
            &self.sha256
        }
    }

    /// URI scheme without the `://` separator, if any
    pub fn scheme(&self) -> Option<&str> {
        self.uri.split_once("://").map(|(scheme, _)| scheme)
    }
}

/// Locally available module artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Path the data plane can load the module from
    pub path: PathBuf,
}

impl ArtifactDescriptor {
    /// Describe an artifact at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path rendered for a `DataSource.filename` specifier
    pub fn filename(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Artifact is on local disk
    Ready(ArtifactDescriptor),
    /// Fetch still in flight
    Pending,
    /// Fetch or verification failed; the string becomes NACK reason text
    Failed(String),
}

impl Resolution {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Ready(_) => "ready",
            Resolution::Pending => "pending",
            Resolution::Failed(_) => "failed",
        }
    }
}

/// Module cache consulted by the extension config translator
///
/// # Example
///
/// ```ignore
/// use silta_core::{ArtifactDescriptor, ModuleCache, ModuleRef, Resolution};
/// use async_trait::async_trait;
///
/// struct Pinned;
///
/// #[async_trait]
/// impl ModuleCache for Pinned {
///     fn name(&self) -> &'static str {
///         "pinned"
///     }
///
///     async fn resolve(&self, _module: &ModuleRef) -> Resolution {
///         Resolution::Ready(ArtifactDescriptor::new("/etc/silta/filter.wasm"))
///     }
///
///     fn cleanup(&self) {}
/// }
/// ```
#[async_trait]
pub trait ModuleCache: Send + Sync {
    /// Cache name for logging
    fn name(&self) -> &'static str;

    /// Look up a module, starting a fetch if needed
    async fn resolve(&self, module: &ModuleRef) -> Resolution;

    /// Drop all cached and in-flight state
    fn cleanup(&self);
}

/// Fetches and verifies a module, producing a local artifact
///
/// Implemented outside the proxy for real registries; the cache adapter
/// drives it and remembers the outcome.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    /// Fetcher name for logging
    fn name(&self) -> &'static str;

    /// Fetch the module to local storage
    async fn fetch(&self, module: &ModuleRef) -> Result<ArtifactDescriptor, FetchError>;
}
