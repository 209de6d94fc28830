//! SILTA runtime - process bootstrap for the proxy
//!
//! Provides [`run()`] for the stock `silta` binary, and [`RuntimeBuilder`]
//! for embedders that need to override addresses or plug in their own
//! module cache.
//!
//! # Quick start
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     silta_runtime::run().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

use silta_proxy::config::{LogFormat, ProxyConfig};
use silta_proxy::metrics::Metrics;
use silta_proxy::metrics_server::MetricsServer;
use silta_proxy::{FetchingModuleCache, FileFetcher, ModuleCache, XdsProxy};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run the proxy with settings from the environment until SIGINT or SIGTERM
pub async fn run() -> anyhow::Result<()> {
    RuntimeBuilder::new().run().await
}

/// Builder for controlling runtime behaviour
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .listen_addr("127.0.0.1:15010".parse()?)
///     .module_cache(Arc::new(MyOciCache::new()))
///     .run()
///     .await
/// ```
pub struct RuntimeBuilder {
    config: Option<ProxyConfig>,
    listen_addr: Option<SocketAddr>,
    listen_uds: Option<PathBuf>,
    metrics_addr: Option<SocketAddr>,
    metrics_enabled: bool,
    module_cache: Option<Arc<dyn ModuleCache>>,
}

impl RuntimeBuilder {
    /// Create a builder; unset options come from `SILTA_*` variables
    pub fn new() -> Self {
        Self {
            config: None,
            listen_addr: None,
            listen_uds: None,
            metrics_addr: None,
            metrics_enabled: true,
            module_cache: None,
        }
    }

    /// Use this configuration instead of reading the environment
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the downstream TCP listen address
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Serve downstream on a Unix domain socket instead of TCP
    pub fn listen_uds(mut self, path: impl Into<PathBuf>) -> Self {
        self.listen_uds = Some(path.into());
        self
    }

    /// Override the metrics HTTP server address
    pub fn metrics_addr(mut self, addr: SocketAddr) -> Self {
        self.metrics_addr = Some(addr);
        self
    }

    /// Do not start the metrics HTTP server
    pub fn disable_metrics(mut self) -> Self {
        self.metrics_enabled = false;
        self
    }

    /// Module cache backend
    ///
    /// Default: a [`FetchingModuleCache`] over [`FileFetcher`].
    pub fn module_cache(mut self, cache: Arc<dyn ModuleCache>) -> Self {
        self.module_cache = Some(cache);
        self
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes
    pub async fn run_until<S>(self, signal: S) -> anyhow::Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        // ── 1. Resolve config ────────────────────────────────────
        let mut config = match self.config {
            Some(config) => config,
            None => ProxyConfig::from_env()?,
        };
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(path) = self.listen_uds {
            config.listen_uds = Some(path);
        }
        if let Some(addr) = self.metrics_addr {
            config.metrics_addr = addr;
        }
        config.validate()?;

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config.log_level, config.log_format);

        info!(
            listen = %listen_description(&config),
            upstream = %config.upstream.address,
            metrics_addr = %config.metrics_addr,
            "Starting SILTA"
        );

        // ── 3. Build proxy ───────────────────────────────────────
        Metrics::init()?;
        let cache = self.module_cache.unwrap_or_else(|| {
            Arc::new(FetchingModuleCache::from_config(
                Arc::new(FileFetcher::new()),
                &config.modules,
            ))
        });
        let proxy = XdsProxy::from_config(&config, cache)?;

        // ── 4. Metrics server ────────────────────────────────────
        let metrics_handle = self
            .metrics_enabled
            .then(|| MetricsServer::start(config.metrics_addr, Some(proxy.registry())));

        // ── 5. Serve until signalled ─────────────────────────────
        let shutdown = {
            let proxy = proxy.clone();
            async move {
                signal.await;
                proxy.shutdown();
            }
        };
        let service = proxy.clone().into_service();

        match config.listen_uds.as_ref() {
            #[cfg(unix)]
            Some(path) => {
                let incoming = bind_uds(path).await?;
                info!(path = %path.display(), "xDS server listening");
                Server::builder()
                    .add_service(service)
                    .serve_with_incoming_shutdown(incoming, shutdown)
                    .await?;
                let _ = tokio::fs::remove_file(path).await;
            }
            #[cfg(not(unix))]
            Some(_) => anyhow::bail!("unix domain sockets are not supported on this platform"),
            None => {
                let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
                info!(addr = %listener.local_addr()?, "xDS server listening");
                Server::builder()
                    .add_service(service)
                    .serve_with_incoming_shutdown(
                        tokio_stream::wrappers::TcpListenerStream::new(listener),
                        shutdown,
                    )
                    .await?;
            }
        }

        // ── 6. Shutdown ──────────────────────────────────────────
        if let Some(handle) = metrics_handle {
            handle.abort();
        }
        info!(sessions = proxy.active_sessions(), "SILTA shutdown complete");

        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn listen_description(config: &ProxyConfig) -> String {
    match &config.listen_uds {
        Some(path) => format!("unix:{}", path.display()),
        None => config.listen_addr.to_string(),
    }
}

/// Bind a Unix socket, replacing a stale socket file left by a previous run
#[cfg(unix)]
async fn bind_uds(
    path: &std::path::Path,
) -> std::io::Result<tokio_stream::wrappers::UnixListenerStream> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let listener = tokio::net::UnixListener::bind(path)?;
    Ok(tokio_stream::wrappers::UnixListenerStream::new(listener))
}

/// Initialise the tracing subscriber
///
/// `RUST_LOG` wins over `level` when set. Does nothing if a global
/// subscriber is already installed.
pub fn init_tracing(level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> ProxyConfig {
        ProxyConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_listen_description() {
        let mut config = test_config();
        assert_eq!(listen_description(&config), "127.0.0.1:0");
        config.listen_uds = Some(PathBuf::from("/tmp/silta.sock"));
        assert_eq!(listen_description(&config), "unix:/tmp/silta.sock");
    }

    #[tokio::test]
    async fn test_run_until_returns_on_signal() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let runtime = tokio::spawn(
            RuntimeBuilder::new()
                .config(test_config())
                .disable_metrics()
                .run_until(async {
                    let _ = rx.await;
                }),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), runtime)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_serving() {
        let mut config = test_config();
        config.forwarder.request_buffer = 0;

        let result = RuntimeBuilder::new()
            .config(config)
            .disable_metrics()
            .run_until(async {})
            .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uds_socket_created_and_removed() {
        let path = std::env::temp_dir().join(format!("silta-rt-{}.sock", std::process::id()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let runtime = tokio::spawn(
            RuntimeBuilder::new()
                .config(test_config())
                .listen_uds(&path)
                .disable_metrics()
                .run_until(async {
                    let _ = rx.await;
                }),
        );

        let mut waited = Duration::ZERO;
        while !path.exists() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert!(path.exists());

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), runtime)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!path.exists());
    }
}
