//! Shared fixtures for proxy integration tests
//!
//! A fixture control plane answers every subscription (a request without a
//! response nonce) with one or more responses and records everything it
//! receives, so tests can check ACKs, NACKs and ordering from the far side.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use silta_proxy::proto::aggregated_discovery_service_client::AggregatedDiscoveryServiceClient;
use silta_proxy::proto::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use silta_proxy::proto::{
    self, AsyncDataSource, ControlPlane as ControlPlaneId, HttpUri, Locality, Metadata,
    PluginConfig, RemoteDataSource, TypedExtensionConfig, VmConfig, Wasm, async_data_source,
    plugin_config, resource,
};
use silta_proxy::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, ForwarderOptions, ModuleCache, ModuleRef, Node,
    Resolution, Resource, UpstreamConfig, UpstreamDialer, XdsProxy, type_url,
};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_stream::Stream;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::{Channel, Server};
use tonic::{Request, Response, Status, Streaming};

/// Nonces are unique across every fixture in the test binary
static NEXT_NONCE: AtomicU64 = AtomicU64::new(1);

fn next_nonce() -> String {
    NEXT_NONCE.fetch_add(1, Ordering::SeqCst).to_string()
}

// ============================================================================
// Slow transport
// ============================================================================

/// Stream that waits `delay` before every item it yields
///
/// Wraps either end of a delta stream to model a peer on a slow link.
pub struct Slow<S> {
    inner: S,
    delay: Duration,
    pause: Option<Pin<Box<Sleep>>>,
}

impl<S> Slow<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            pause: None,
        }
    }
}

impl<S: Stream + Unpin> Stream for Slow<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = self.get_mut();
        if !this.delay.is_zero() {
            let delay = this.delay;
            let pause = this
                .pause
                .get_or_insert_with(|| Box::pin(tokio::time::sleep(delay)));
            ready!(pause.as_mut().poll(cx));
        }
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        this.pause = None;
        Poll::Ready(item)
    }
}

// ============================================================================
// Fixture control plane
// ============================================================================

/// How the fixture answers subscriptions
#[derive(Clone)]
pub struct FixtureOptions {
    /// Responses pushed per subscription
    pub responses_per_subscription: usize,
    /// Extra bytes attached to each non-ECDS resource
    pub payload_bytes: usize,
    /// Remote URI used for Wasm modules in extension configs
    pub module_uri: String,
    /// Pause before each response reaches the wire
    pub send_delay: Duration,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            responses_per_subscription: 1,
            payload_bytes: 0,
            module_uri: "https://fixture.invalid/filter.wasm".to_string(),
            send_delay: Duration::ZERO,
        }
    }
}

#[derive(Clone)]
pub struct ControlPlane {
    options: FixtureOptions,
    received: Arc<Mutex<Vec<DeltaDiscoveryRequest>>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl ControlPlane {
    fn new(options: FixtureOptions) -> Self {
        Self {
            options,
            received: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request received, in arrival order
    pub fn received(&self) -> Vec<DeltaDiscoveryRequest> {
        self.received.lock().unwrap().clone()
    }

    /// `(type_url, nonce)` of every response pushed
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Requests carrying error detail
    pub fn nacks(&self) -> Vec<DeltaDiscoveryRequest> {
        self.received()
            .into_iter()
            .filter(|r| r.error_detail.is_some())
            .collect()
    }

    fn response_for(&self, request: &DeltaDiscoveryRequest) -> DeltaDiscoveryResponse {
        let names = if request.resource_names_subscribe.is_empty() {
            vec!["default".to_string()]
        } else {
            request.resource_names_subscribe.clone()
        };

        let resources = names
            .iter()
            .map(|name| {
                if request.type_url == type_url::EXTENSION_CONFIG {
                    remote_wasm_resource(name, &self.options.module_uri)
                } else {
                    Resource {
                        name: name.clone(),
                        version: "1".to_string(),
                        resource: Some(prost_types::Any {
                            type_url: request.type_url.clone(),
                            value: vec![0u8; self.options.payload_bytes],
                        }),
                        cache_control: Some(resource::CacheControl { do_not_cache: true }),
                        metadata: Some(fixture_metadata()),
                        ..Default::default()
                    }
                }
            })
            .collect();

        DeltaDiscoveryResponse {
            type_url: request.type_url.clone(),
            nonce: next_nonce(),
            system_version_info: "fixture".to_string(),
            resources,
            control_plane: Some(ControlPlaneId {
                identifier: FIXTURE_ID.to_string(),
            }),
            ..Default::default()
        }
    }
}

/// Identifier the fixture stamps on every response
pub const FIXTURE_ID: &str = "fixture-control-plane";

/// Metadata the fixture attaches to every non-ECDS resource
pub fn fixture_metadata() -> Metadata {
    Metadata {
        filter_metadata: [(
            "fixture".to_string(),
            prost_types::Struct {
                fields: [(
                    "owner".to_string(),
                    prost_types::Value {
                        kind: Some(prost_types::value::Kind::StringValue("mesh".to_string())),
                    },
                )]
                .into(),
            },
        )]
        .into(),
        ..Default::default()
    }
}

#[async_trait]
impl AggregatedDiscoveryService for ControlPlane {
    type DeltaAggregatedResourcesStream =
        Slow<ReceiverStream<Result<DeltaDiscoveryResponse, Status>>>;

    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        let mut incoming = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let fixture = self.clone();

        tokio::spawn(async move {
            while let Ok(Some(request)) = incoming.message().await {
                fixture.received.lock().unwrap().push(request.clone());

                let subscription =
                    request.response_nonce.is_empty() && request.error_detail.is_none();
                if !subscription {
                    continue;
                }

                for _ in 0..fixture.options.responses_per_subscription {
                    let response = fixture.response_for(&request);
                    fixture
                        .sent
                        .lock()
                        .unwrap()
                        .push((response.type_url.clone(), response.nonce.clone()));
                    if tx.send(Ok(response)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Response::new(Slow::new(
            ReceiverStream::new(rx),
            self.options.send_delay,
        )))
    }
}

/// Extension config wrapping a Wasm HTTP filter with remote code
pub fn remote_wasm_resource(name: &str, uri: &str) -> Resource {
    let wasm = Wasm {
        config: Some(PluginConfig {
            name: name.to_string(),
            vm: Some(plugin_config::Vm::VmConfig(VmConfig {
                runtime: "envoy.wasm.runtime.v8".to_string(),
                code: Some(AsyncDataSource {
                    specifier: Some(async_data_source::Specifier::Remote(RemoteDataSource {
                        http_uri: Some(HttpUri {
                            uri: uri.to_string(),
                            cluster: "fixture".to_string(),
                            timeout: None,
                        }),
                        sha256: String::new(),
                    })),
                }),
                ..Default::default()
            })),
            ..Default::default()
        }),
    };
    let ext = TypedExtensionConfig {
        name: name.to_string(),
        typed_config: Some(proto::pack(type_url::WASM_HTTP_FILTER, &wasm)),
    };
    Resource {
        name: name.to_string(),
        version: "1".to_string(),
        resource: Some(proto::pack(type_url::EXTENSION_CONFIG, &ext)),
        ..Default::default()
    }
}

/// VM code specifier of an extension config resource
pub fn wasm_code(resource: &Resource) -> async_data_source::Specifier {
    let ext: TypedExtensionConfig =
        proto::unpack(resource.resource.as_ref().unwrap(), type_url::EXTENSION_CONFIG).unwrap();
    let wasm: Wasm =
        proto::unpack(ext.typed_config.as_ref().unwrap(), type_url::WASM_HTTP_FILTER).unwrap();
    let plugin_config::Vm::VmConfig(vm) = wasm.config.unwrap().vm.unwrap();
    vm.code.unwrap().specifier.unwrap()
}

async fn bind() -> (SocketAddr, TcpListenerStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, TcpListenerStream::new(listener))
}

/// Start a fixture control plane
pub async fn start_control_plane(options: FixtureOptions) -> (SocketAddr, ControlPlane) {
    let fixture = ControlPlane::new(options);
    let (addr, incoming) = bind().await;
    let service = AggregatedDiscoveryServiceServer::new(fixture.clone());
    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(incoming)
            .await
            .ok();
    });
    (addr, fixture)
}

// ============================================================================
// Proxy
// ============================================================================

/// Cache giving the same answer for every module
pub struct StaticCache(pub Resolution);

#[async_trait]
impl ModuleCache for StaticCache {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self, _module: &ModuleRef) -> Resolution {
        self.0.clone()
    }

    fn cleanup(&self) {}
}

/// Start a proxy in front of `upstream`
pub async fn start_proxy(
    upstream: SocketAddr,
    cache: Arc<dyn ModuleCache>,
    options: ForwarderOptions,
) -> (SocketAddr, XdsProxy) {
    let dialer = UpstreamDialer::new(UpstreamConfig {
        address: format!("http://{upstream}"),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();
    let proxy = XdsProxy::new(dialer, options, cache);
    let (addr, incoming) = bind().await;
    let service = proxy.clone().into_service();
    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(incoming)
            .await
            .ok();
    });
    (addr, proxy)
}

/// Connect a data plane client
pub async fn connect(addr: SocketAddr) -> AggregatedDiscoveryServiceClient<Channel> {
    AggregatedDiscoveryServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
}

type Opened = (
    mpsc::Sender<DeltaDiscoveryRequest>,
    Streaming<DeltaDiscoveryResponse>,
);

/// Open a delta stream; requests are fed through the returned sender
pub async fn open(
    client: &mut AggregatedDiscoveryServiceClient<Channel>,
) -> Result<Opened, Status> {
    open_slow(client, Duration::ZERO).await
}

/// Like [`open`], but each request waits `delay` before it is written
pub async fn open_slow(
    client: &mut AggregatedDiscoveryServiceClient<Channel>,
    delay: Duration,
) -> Result<Opened, Status> {
    let (tx, rx) = mpsc::channel(64);
    let response = client
        .delta_aggregated_resources(Slow::new(ReceiverStream::new(rx), delay))
        .await?;
    Ok((tx, response.into_inner()))
}

pub fn node() -> Node {
    Node {
        id: "sidecar~10.1.2.3~app-7d9f.default~default.svc.cluster.local".to_string(),
        cluster: "app.default".to_string(),
        ..Default::default()
    }
}

/// Node as a real sidecar reports it, with locality and client features
pub fn detailed_node() -> Node {
    Node {
        locality: Some(Locality {
            region: "us-east".to_string(),
            zone: "us-east-1a".to_string(),
            ..Default::default()
        }),
        user_agent_name: "envoy".to_string(),
        user_agent_version_type: Some(proto::node::UserAgentVersionType::UserAgentVersion(
            "1.30.2".to_string(),
        )),
        client_features: vec![
            "envoy.lb.does_not_support_overprovisioning".to_string(),
            "envoy.config.require-any-fields-contain-struct".to_string(),
        ],
        ..node()
    }
}

pub fn subscribe(type_url: &str, names: &[&str]) -> DeltaDiscoveryRequest {
    DeltaDiscoveryRequest {
        type_url: type_url.to_string(),
        resource_names_subscribe: names.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

pub fn ack(type_url: &str, nonce: &str) -> DeltaDiscoveryRequest {
    DeltaDiscoveryRequest {
        type_url: type_url.to_string(),
        response_nonce: nonce.to_string(),
        ..Default::default()
    }
}

pub fn with_node(mut request: DeltaDiscoveryRequest) -> DeltaDiscoveryRequest {
    request.node = Some(node());
    request
}

/// Next response, failing the test after five seconds
pub async fn next_response(
    stream: &mut Streaming<DeltaDiscoveryResponse>,
) -> Result<DeltaDiscoveryResponse, Status> {
    tokio::time::timeout(Duration::from_secs(5), stream.message())
        .await
        .expect("timed out waiting for response")
        .map(|r| r.expect("stream ended"))
}

/// Poll `check` until it holds or `within` elapses
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
