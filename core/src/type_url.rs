//! Well-known xDS type URLs

/// Prefix shared by every protobuf `Any` type URL
pub const TYPE_PREFIX: &str = "type.googleapis.com/";

/// CDS
pub const CLUSTER: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
/// EDS
pub const ENDPOINT: &str = "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
/// LDS
pub const LISTENER: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
/// RDS
pub const ROUTE: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
/// SDS
pub const SECRET: &str = "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";
/// ECDS - the only type the proxy rewrites
pub const EXTENSION_CONFIG: &str = "type.googleapis.com/envoy.config.core.v3.TypedExtensionConfig";

/// Wasm HTTP filter config carried inside an ECDS resource
pub const WASM_HTTP_FILTER: &str = "type.googleapis.com/envoy.extensions.filters.http.wasm.v3.Wasm";
/// Wasm network filter config carried inside an ECDS resource
pub const WASM_NETWORK_FILTER: &str =
    "type.googleapis.com/envoy.extensions.filters.network.wasm.v3.Wasm";

/// Short form used in logs and metric labels
///
/// `type.googleapis.com/envoy.config.cluster.v3.Cluster` becomes `Cluster`.
pub fn short_name(type_url: &str) -> &str {
    let name = type_url.strip_prefix(TYPE_PREFIX).unwrap_or(type_url);
    name.rsplit('.').next().unwrap_or(name)
}

/// The Wasm filter type the proxy knows how to localize, if `type_url` names one
///
/// Returns the canonical constant so callers can hand it to
/// [`crate::proto::unpack`].
pub fn wasm_filter(type_url: &str) -> Option<&'static str> {
    match type_url {
        WASM_HTTP_FILTER => Some(WASM_HTTP_FILTER),
        WASM_NETWORK_FILTER => Some(WASM_NETWORK_FILTER),
        _ => None,
    }
}
