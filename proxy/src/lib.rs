//! SILTA - sidecar delta xDS proxy
//!
//! Terminates a local delta ADS stream from the data plane, forwards it to
//! the control plane and streams configuration back. Extension configs that
//! reference remote Wasm modules are rewritten to point at local artifacts.
//!
//! # Session layout
//!
//! ```text
//! data plane ◄──► XdsProxy ──► StreamForwarder ◄──► control plane
//!                                   │
//!                                   ├─ NonceTracker
//!                                   └─ EcdsTranslator ──► ModuleCache
//! ```
//!
//! The module cache is an injected capability ([`silta_core::ModuleCache`]);
//! [`FetchingModuleCache`] adapts any [`silta_core::ModuleFetcher`] to it.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod ecds;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod metrics_server;
pub mod module_cache;
pub mod nonce;
pub mod server;
pub mod session;
pub mod upstream;

pub use config::{ForwarderOptions, LogFormat, ModuleCacheConfig, ProxyConfig, UpstreamConfig};
pub use ecds::{EcdsTranslator, Translation};
pub use error::{Direction, Result, SiltaError};
pub use forward::StreamForwarder;
pub use metrics::Metrics;
pub use metrics_server::MetricsServer;
pub use module_cache::{FetchingModuleCache, FileFetcher, ModuleCacheHandle};
pub use nonce::{NonceCell, NonceSnapshot, NonceTracker, RequestKind};
pub use server::XdsProxy;
pub use session::{SessionGuard, SessionInfo, SessionRegistry};
pub use upstream::{AdsClient, HeaderInterceptor, UpstreamDialer};

/// Re-exports from silta-core
pub use silta_core::{
    ArtifactDescriptor, DeltaDiscoveryRequest, DeltaDiscoveryResponse, FetchError, ModuleCache,
    ModuleFetcher, ModuleRef, Node, Resolution, Resource, proto, type_url,
};
