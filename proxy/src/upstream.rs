//! Upstream (control plane) connection setup
//!
//! Every session dials its own connection with the same options: connect
//! timeout, HTTP/2 keep-alive, message size limits and a fixed set of
//! metadata headers added to each call.

use crate::config::UpstreamConfig;
use crate::error::{Result, SiltaError};
use silta_core::proto::aggregated_discovery_service_client::AggregatedDiscoveryServiceClient;
use silta_core::{DeltaDiscoveryRequest, DeltaDiscoveryResponse};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status, Streaming};
use tracing::debug;

/// ADS client type used for upstream calls
pub type AdsClient = AggregatedDiscoveryServiceClient<InterceptedService<Channel, HeaderInterceptor>>;

/// Adds static metadata to every upstream call
#[derive(Debug, Clone, Default)]
pub struct HeaderInterceptor {
    headers: Arc<Vec<(AsciiMetadataKey, AsciiMetadataValue)>>,
}

impl HeaderInterceptor {
    /// Validate and build from `(key, value)` pairs
    pub fn new(pairs: &[(String, String)]) -> Result<Self> {
        let mut headers = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = AsciiMetadataKey::from_bytes(key.as_bytes())
                .map_err(|e| SiltaError::Config(format!("invalid header name {key:?}: {e}")))?;
            let value = AsciiMetadataValue::try_from(value.as_str()).map_err(|e| {
                SiltaError::Config(format!("invalid header value for {}: {e}", key.as_str()))
            })?;
            headers.push((key, value));
        }
        Ok(Self {
            headers: Arc::new(headers),
        })
    }

    /// Number of headers added per call
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether no headers are added
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Interceptor for HeaderInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        for (key, value) in self.headers.iter() {
            request.metadata_mut().insert(key.clone(), value.clone());
        }
        Ok(request)
    }
}

/// Dials the control plane for each new session
#[derive(Debug, Clone)]
pub struct UpstreamDialer {
    config: UpstreamConfig,
    endpoint: Endpoint,
    interceptor: HeaderInterceptor,
}

impl UpstreamDialer {
    /// Build a dialer, validating the address and headers up front
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let endpoint = Endpoint::from_shared(config.address.clone())
            .map_err(|e| SiltaError::Config(format!("upstream address {}: {e}", config.address)))?
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(Some(config.keepalive_interval))
            .http2_keep_alive_interval(config.keepalive_interval)
            .keep_alive_timeout(config.keepalive_timeout)
            .keep_alive_while_idle(true);
        let interceptor = HeaderInterceptor::new(&config.headers)?;

        Ok(Self {
            config,
            endpoint,
            interceptor,
        })
    }

    /// Upstream address
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Message size limit applied in both directions
    pub fn max_message_size(&self) -> usize {
        self.config.max_message_size
    }

    /// Establish a new connection
    pub async fn dial(&self) -> Result<AdsClient> {
        let channel = self.endpoint.connect().await?;
        debug!(upstream = %self.config.address, "Upstream connected");

        Ok(
            AggregatedDiscoveryServiceClient::with_interceptor(channel, self.interceptor.clone())
                .max_decoding_message_size(self.config.max_message_size)
                .max_encoding_message_size(self.config.max_message_size),
        )
    }
}

/// Open the delta stream on an established connection
///
/// Requests are pulled from `requests` for as long as the stream lives.
pub async fn open_stream(
    mut client: AdsClient,
    requests: mpsc::Receiver<DeltaDiscoveryRequest>,
) -> Result<UpstreamStream> {
    let response = client
        .delta_aggregated_resources(ReceiverStream::new(requests))
        .await
        .map_err(SiltaError::Upstream)?;

    Ok(UpstreamStream {
        _client: Box::new(client),
        inner: response.into_inner(),
    })
}

/// Upstream response stream that keeps its connection alive
///
/// Dropping it cancels the HTTP/2 stream and releases the connection.
pub struct UpstreamStream {
    _client: Box<AdsClient>,
    inner: Streaming<DeltaDiscoveryResponse>,
}

impl Stream for UpstreamStream {
    type Item = std::result::Result<DeltaDiscoveryResponse, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(address: &str) -> UpstreamConfig {
        UpstreamConfig {
            address: address.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_interceptor_adds_headers() {
        let mut interceptor = HeaderInterceptor::new(&[
            ("authorization".to_string(), "Bearer abc".to_string()),
            ("x-cluster-id".to_string(), "east".to_string()),
        ])
        .unwrap();
        assert_eq!(interceptor.len(), 2);

        let request = interceptor.call(Request::new(())).unwrap();
        assert_eq!(
            request.metadata().get("authorization").unwrap(),
            "Bearer abc"
        );
        assert_eq!(request.metadata().get("x-cluster-id").unwrap(), "east");
    }

    #[test]
    fn test_interceptor_rejects_bad_header() {
        let result = HeaderInterceptor::new(&[("bad header".to_string(), "v".to_string())]);
        assert!(matches!(result, Err(SiltaError::Config(_))));

        let result = HeaderInterceptor::new(&[("k".to_string(), "line\nbreak".to_string())]);
        assert!(matches!(result, Err(SiltaError::Config(_))));
    }

    #[test]
    fn test_dialer_rejects_invalid_address() {
        let result = UpstreamDialer::new(config("not a uri"));
        assert!(matches!(result, Err(SiltaError::Config(_))));
    }

    #[tokio::test]
    async fn test_dial_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut cfg = config(&format!("http://{addr}"));
        cfg.connect_timeout = Duration::from_secs(2);
        let dialer = UpstreamDialer::new(cfg).unwrap();

        let err = dialer.dial().await.unwrap_err();
        assert!(matches!(err, SiltaError::Transport(_)));
        let status: Status = err.into();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
