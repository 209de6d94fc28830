//! Session manager - the downstream-facing ADS server
//!
//! Each `DeltaAggregatedResources` call becomes one session:
//!
//! 1. dial the control plane (failure is returned to the caller as
//!    `UNAVAILABLE`)
//! 2. register the session and create its nonce tracker
//! 3. spawn a [`StreamForwarder`] and hand back the downstream queue as the
//!    response stream
//!
//! The state-of-the-world `StreamAggregatedResources` method is not served;
//! tonic answers it with `UNIMPLEMENTED`.

use crate::config::{ForwarderOptions, ProxyConfig};
use crate::ecds::EcdsTranslator;
use crate::error::Result;
use crate::forward::{DownstreamItem, StreamForwarder};
use crate::module_cache::ModuleCacheHandle;
use crate::nonce::NonceTracker;
use crate::session::{SessionInfo, SessionRegistry};
use crate::upstream::{UpstreamDialer, open_stream};
use silta_core::proto::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use silta_core::{DeltaDiscoveryRequest, ModuleCache};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

struct Inner {
    dialer: UpstreamDialer,
    options: ForwarderOptions,
    cache: ModuleCacheHandle,
    registry: Arc<SessionRegistry>,
    shutdown: watch::Sender<bool>,
}

/// Delta xDS proxy
///
/// Cheap to clone; clones share sessions, cache and shutdown state.
#[derive(Clone)]
pub struct XdsProxy {
    inner: Arc<Inner>,
}

impl XdsProxy {
    /// Create a proxy
    pub fn new(
        dialer: UpstreamDialer,
        options: ForwarderOptions,
        cache: Arc<dyn ModuleCache>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                dialer,
                options,
                cache: ModuleCacheHandle::new(cache),
                registry: Arc::new(SessionRegistry::new()),
                shutdown,
            }),
        }
    }

    /// Create a proxy from configuration
    pub fn from_config(config: &ProxyConfig, cache: Arc<dyn ModuleCache>) -> Result<Self> {
        let dialer = UpstreamDialer::new(config.upstream.clone())?;
        Ok(Self::new(dialer, config.forwarder, cache))
    }

    /// Number of live sessions
    pub fn active_sessions(&self) -> usize {
        self.inner.registry.len()
    }

    /// Snapshot of live sessions
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner.registry.list()
    }

    /// Shared session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Handle to the module cache in use
    pub fn module_cache(&self) -> ModuleCacheHandle {
        self.inner.cache.clone()
    }

    /// Swap the module cache backend
    ///
    /// Sessions pick up the new backend on their next extension config
    /// response. The old backend is cleaned up.
    pub fn set_module_cache(&self, cache: Arc<dyn ModuleCache>) {
        let new_name = cache.name();
        let old = self.inner.cache.replace(cache);
        info!(old = old.name(), new = new_name, "Module cache replaced");
        old.cleanup();
    }

    /// Stop every live session and refuse new ones
    pub fn shutdown(&self) {
        info!(sessions = self.active_sessions(), "Shutting down proxy sessions");
        self.inner.shutdown.send_replace(true);
        self.inner.cache.get().cleanup();
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Wrap in the generated tonic service
    pub fn into_service(self) -> AggregatedDiscoveryServiceServer<Self> {
        let limit = self.inner.dialer.max_message_size();
        AggregatedDiscoveryServiceServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }
}

impl std::fmt::Debug for XdsProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XdsProxy")
            .field("upstream", &self.inner.dialer.address())
            .field("sessions", &self.active_sessions())
            .field("module_cache", &self.inner.cache)
            .finish()
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for XdsProxy {
    type DeltaAggregatedResourcesStream = ReceiverStream<DownstreamItem>;

    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        if self.is_shut_down() {
            return Err(Status::unavailable("proxy is shutting down"));
        }

        let remote = request.remote_addr();
        let client = self.inner.dialer.dial().await.map_err(|e| {
            warn!(
                upstream = %self.inner.dialer.address(),
                error = %e,
                "Upstream dial failed"
            );
            Status::from(e)
        })?;

        let options = self.inner.options;
        let (upstream_tx, upstream_rx) = mpsc::channel(options.request_buffer);
        let (downstream_tx, downstream_rx) = mpsc::channel(options.response_buffer);

        let nonces = Arc::new(NonceTracker::new());
        let session = self.inner.registry.register(Arc::clone(&nonces));
        debug!(session_id = session.id(), remote = ?remote, "Accepted downstream stream");

        let forwarder = StreamForwarder::new(
            session,
            nonces,
            EcdsTranslator::new(self.inner.cache.clone()),
            options,
            self.inner.shutdown.subscribe(),
        );
        tokio::spawn(forwarder.run(
            request.into_inner(),
            open_stream(client, upstream_rx),
            upstream_tx,
            downstream_tx,
        ));

        Ok(Response::new(ReceiverStream::new(downstream_rx)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::module_cache::{FetchingModuleCache, FileFetcher};
    use std::time::Duration;

    fn proxy() -> XdsProxy {
        let dialer = UpstreamDialer::new(UpstreamConfig::default()).unwrap();
        let cache = Arc::new(FetchingModuleCache::new(
            Arc::new(FileFetcher::new()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        XdsProxy::new(dialer, ForwarderOptions::default(), cache)
    }

    #[test]
    fn test_new_proxy_has_no_sessions() {
        let proxy = proxy();
        assert_eq!(proxy.active_sessions(), 0);
        assert!(proxy.sessions().is_empty());
        assert!(!proxy.is_shut_down());
    }

    #[test]
    fn test_shutdown_flag() {
        let proxy = proxy();
        let clone = proxy.clone();
        proxy.shutdown();
        assert!(clone.is_shut_down());
    }

    #[test]
    fn test_set_module_cache_swaps_backend() {
        struct Named;

        #[async_trait::async_trait]
        impl ModuleCache for Named {
            fn name(&self) -> &'static str {
                "named"
            }
            async fn resolve(&self, _m: &silta_core::ModuleRef) -> silta_core::Resolution {
                silta_core::Resolution::Pending
            }
            fn cleanup(&self) {}
        }

        let proxy = proxy();
        assert_eq!(proxy.module_cache().get().name(), "fetching");
        proxy.set_module_cache(Arc::new(Named));
        assert_eq!(proxy.module_cache().get().name(), "named");
    }
}
