//! Configuration for SILTA
//!
//! Everything is read from `SILTA_*` environment variables with defaults
//! suitable for a sidecar talking to a local data plane.

use crate::error::{Result, SiltaError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SILTA_";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = SiltaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(SiltaError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// How the proxy dials the control plane
///
/// Applied identically to every session's upstream connection.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Control plane URI, e.g. `http://istiod.istio-system:15012`
    pub address: String,
    /// Dial timeout
    pub connect_timeout: Duration,
    /// HTTP/2 keep-alive ping interval
    pub keepalive_interval: Duration,
    /// How long to wait for a keep-alive ack
    pub keepalive_timeout: Duration,
    /// Max encoded/decoded message size in bytes
    pub max_message_size: usize,
    /// Static metadata attached to every upstream call
    pub headers: Vec<(String, String)>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:15012".to_string(),
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(10),
            max_message_size: 4 * 1024 * 1024,
            headers: Vec::new(),
        }
    }
}

/// Buffering between the read and send side of each session direction
#[derive(Debug, Clone, Copy)]
pub struct ForwarderOptions {
    /// Capacity of the upstream-bound request queue
    pub request_buffer: usize,
    /// Capacity of the downstream-bound response queue
    pub response_buffer: usize,
    /// How long an enqueue may wait for capacity before the session is torn down
    pub send_timeout: Duration,
}

impl Default for ForwarderOptions {
    fn default() -> Self {
        Self {
            request_buffer: 10,
            response_buffer: 5,
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// Module cache tuning
#[derive(Debug, Clone)]
pub struct ModuleCacheConfig {
    /// Directory fetchers store artifacts in
    pub dir: PathBuf,
    /// How long `resolve` waits on an in-flight fetch before reporting pending
    pub wait: Duration,
    /// How long a failed module is remembered before it is fetched again
    pub failure_ttl: Duration,
}

impl Default for ModuleCacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/lib/silta/modules"),
            wait: Duration::from_secs(5),
            failure_ttl: Duration::from_secs(30),
        }
    }
}

/// Top level SILTA configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Downstream listen address (TCP)
    pub listen_addr: SocketAddr,
    /// Downstream Unix socket; takes precedence over `listen_addr`
    pub listen_uds: Option<PathBuf>,
    /// Control plane dial settings
    pub upstream: UpstreamConfig,
    /// Per-session buffering
    pub forwarder: ForwarderOptions,
    /// Module cache settings
    pub modules: ModuleCacheConfig,
    /// Metrics/health HTTP address
    pub metrics_addr: SocketAddr,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 15010)),
            listen_uds: None,
            upstream: UpstreamConfig::default(),
            forwarder: ForwarderOptions::default(),
            modules: ModuleCacheConfig::default(),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 15020)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from `SILTA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Keys are full variable names (`SILTA_LISTEN_ADDR`). Unset keys keep
    /// their defaults; set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let mut config = Self::default();

        if let Some(addr) = env.parse::<SocketAddr>("LISTEN_ADDR")? {
            config.listen_addr = addr;
        }
        config.listen_uds = env.get("LISTEN_UDS").map(PathBuf::from);

        if let Some(address) = env.get("UPSTREAM_ADDR") {
            config.upstream.address = address;
        }
        if let Some(ms) = env.parse::<u64>("UPSTREAM_CONNECT_TIMEOUT_MS")? {
            config.upstream.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env.parse::<u64>("UPSTREAM_KEEPALIVE_SECS")? {
            config.upstream.keepalive_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = env.get("UPSTREAM_HEADERS") {
            config.upstream.headers = parse_headers(&raw)?;
        }
        if let Some(bytes) = env.parse::<usize>("MAX_MESSAGE_BYTES")? {
            config.upstream.max_message_size = bytes;
        }

        if let Some(n) = env.parse::<usize>("REQUEST_BUFFER")? {
            config.forwarder.request_buffer = n;
        }
        if let Some(n) = env.parse::<usize>("RESPONSE_BUFFER")? {
            config.forwarder.response_buffer = n;
        }
        if let Some(ms) = env.parse::<u64>("SEND_TIMEOUT_MS")? {
            config.forwarder.send_timeout = Duration::from_millis(ms);
        }

        if let Some(dir) = env.get("MODULE_DIR") {
            config.modules.dir = PathBuf::from(dir);
        }
        if let Some(ms) = env.parse::<u64>("MODULE_WAIT_MS")? {
            config.modules.wait = Duration::from_millis(ms);
        }
        if let Some(secs) = env.parse::<u64>("MODULE_FAILURE_TTL_SECS")? {
            config.modules.failure_ttl = Duration::from_secs(secs);
        }

        if let Some(addr) = env.parse::<SocketAddr>("METRICS_ADDR")? {
            config.metrics_addr = addr;
        }
        if let Some(level) = env.get("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = env.parse::<LogFormat>("LOG_FORMAT")? {
            config.log_format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make sessions unusable
    pub fn validate(&self) -> Result<()> {
        if self.forwarder.request_buffer == 0 || self.forwarder.response_buffer == 0 {
            return Err(SiltaError::Config(
                "request and response buffers must hold at least one message".to_string(),
            ));
        }
        if self.forwarder.send_timeout.is_zero() {
            return Err(SiltaError::Config("send timeout must be non-zero".to_string()));
        }
        if self.upstream.address.is_empty() {
            return Err(SiltaError::Config("upstream address is required".to_string()));
        }
        Ok(())
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{ENV_PREFIX}{key}")).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                SiltaError::Config(format!("{ENV_PREFIX}{key}='{raw}': {e}"))
            }),
        }
    }
}

/// Parse `k=v,k2=v2` into header pairs
fn parse_headers(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                Ok((k.trim().to_ascii_lowercase(), v.trim().to_string()))
            }
            _ => Err(SiltaError::Config(format!(
                "invalid header '{pair}', expected key=value"
            ))),
        })
        .collect()
}
