// Envoy v3 xDS messages carried by the proxy.
//
// Field numbers match the upstream .proto definitions so the messages are
// wire-compatible with real control planes and data planes. Every message
// that is decoded and re-encoded on the forwarding path declares all of its
// fields, so nothing is lost in transit. The one exception is
// `RemoteDataSource`: it is only read, and it is replaced by a local
// `DataSource` whenever a resource is re-encoded.

// ─────────────────────────────────────────────────────────────────────────────
// envoy.config.core.v3 - node identity
// ─────────────────────────────────────────────────────────────────────────────

/// `envoy.config.core.v3.Node`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub cluster: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub metadata: ::core::option::Option<::prost_types::Struct>,
    #[prost(message, optional, tag = "4")]
    pub locality: ::core::option::Option<Locality>,
    #[prost(string, tag = "6")]
    pub user_agent_name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "9")]
    pub extensions: ::prost::alloc::vec::Vec<Extension>,
    #[prost(string, repeated, tag = "10")]
    pub client_features: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "11")]
    pub listening_addresses: ::prost::alloc::vec::Vec<Address>,
    #[prost(map = "string, message", tag = "12")]
    pub dynamic_parameters:
        ::std::collections::HashMap<::prost::alloc::string::String, ContextParams>,
    #[prost(oneof = "node::UserAgentVersionType", tags = "7, 8")]
    pub user_agent_version_type: ::core::option::Option<node::UserAgentVersionType>,
}

/// Nested message and enum types in `Node`.
pub mod node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum UserAgentVersionType {
        #[prost(string, tag = "7")]
        UserAgentVersion(::prost::alloc::string::String),
        #[prost(message, tag = "8")]
        UserAgentBuildVersion(super::BuildVersion),
    }
}

/// `envoy.config.core.v3.Locality`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Locality {
    #[prost(string, tag = "1")]
    pub region: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub zone: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub sub_zone: ::prost::alloc::string::String,
}

/// `envoy.type.v3.SemanticVersion`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SemanticVersion {
    #[prost(uint32, tag = "1")]
    pub major_number: u32,
    #[prost(uint32, tag = "2")]
    pub minor_number: u32,
    #[prost(uint32, tag = "3")]
    pub patch: u32,
}

/// `envoy.config.core.v3.BuildVersion`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BuildVersion {
    #[prost(message, optional, tag = "1")]
    pub version: ::core::option::Option<SemanticVersion>,
    #[prost(message, optional, tag = "2")]
    pub metadata: ::core::option::Option<::prost_types::Struct>,
}

/// `envoy.config.core.v3.Extension`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Extension {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub category: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub type_descriptor: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub version: ::core::option::Option<BuildVersion>,
    #[prost(bool, tag = "5")]
    pub disabled: bool,
    #[prost(string, repeated, tag = "6")]
    pub type_urls: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// `xds.core.v3.ContextParams`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContextParams {
    #[prost(map = "string, string", tag = "1")]
    pub params: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

/// `envoy.config.core.v3.Address`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Address {
    #[prost(oneof = "address::Address", tags = "1, 2, 3")]
    pub address: ::core::option::Option<address::Address>,
}

/// Nested message and enum types in `Address`.
pub mod address {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Address {
        #[prost(message, tag = "1")]
        SocketAddress(super::SocketAddress),
        #[prost(message, tag = "2")]
        Pipe(super::Pipe),
        #[prost(message, tag = "3")]
        EnvoyInternalAddress(super::EnvoyInternalAddress),
    }
}

/// `envoy.config.core.v3.SocketAddress`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SocketAddress {
    #[prost(enumeration = "socket_address::Protocol", tag = "1")]
    pub protocol: i32,
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub resolver_name: ::prost::alloc::string::String,
    #[prost(bool, tag = "6")]
    pub ipv4_compat: bool,
    #[prost(string, tag = "7")]
    pub network_namespace_filepath: ::prost::alloc::string::String,
    #[prost(oneof = "socket_address::PortSpecifier", tags = "3, 4")]
    pub port_specifier: ::core::option::Option<socket_address::PortSpecifier>,
}

/// Nested message and enum types in `SocketAddress`.
pub mod socket_address {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Protocol {
        Tcp = 0,
        Udp = 1,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PortSpecifier {
        #[prost(uint32, tag = "3")]
        PortValue(u32),
        #[prost(string, tag = "4")]
        NamedPort(::prost::alloc::string::String),
    }
}

/// `envoy.config.core.v3.Pipe`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pipe {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub mode: u32,
}

/// `envoy.config.core.v3.EnvoyInternalAddress`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvoyInternalAddress {
    #[prost(string, tag = "2")]
    pub endpoint_id: ::prost::alloc::string::String,
    #[prost(oneof = "envoy_internal_address::AddressNameSpecifier", tags = "1")]
    pub address_name_specifier:
        ::core::option::Option<envoy_internal_address::AddressNameSpecifier>,
}

/// Nested message and enum types in `EnvoyInternalAddress`.
pub mod envoy_internal_address {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum AddressNameSpecifier {
        #[prost(string, tag = "1")]
        ServerListenerName(::prost::alloc::string::String),
    }
}

/// `envoy.config.core.v3.ControlPlane`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControlPlane {
    #[prost(string, tag = "1")]
    pub identifier: ::prost::alloc::string::String,
}

/// `envoy.config.core.v3.Metadata`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(map = "string, message", tag = "1")]
    pub filter_metadata:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost_types::Struct>,
    #[prost(map = "string, message", tag = "2")]
    pub typed_filter_metadata:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost_types::Any>,
}

// ─────────────────────────────────────────────────────────────────────────────
// envoy.service.discovery.v3 - delta protocol
// ─────────────────────────────────────────────────────────────────────────────

/// `google.rpc.Status`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
}

/// `envoy.service.discovery.v3.ResourceLocator`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceLocator {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "2")]
    pub dynamic_parameters: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

/// `envoy.service.discovery.v3.DynamicParameterConstraints`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DynamicParameterConstraints {
    #[prost(oneof = "dynamic_parameter_constraints::Type", tags = "1, 2, 3, 4")]
    pub r#type: ::core::option::Option<dynamic_parameter_constraints::Type>,
}

/// Nested message and enum types in `DynamicParameterConstraints`.
pub mod dynamic_parameter_constraints {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SingleConstraint {
        #[prost(string, tag = "1")]
        pub key: ::prost::alloc::string::String,
        #[prost(oneof = "single_constraint::ConstraintType", tags = "2, 3")]
        pub constraint_type: ::core::option::Option<single_constraint::ConstraintType>,
    }

    /// Nested message and enum types in `SingleConstraint`.
    pub mod single_constraint {
        #[derive(Clone, Copy, PartialEq, ::prost::Message)]
        pub struct Exists {}

        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum ConstraintType {
            #[prost(string, tag = "2")]
            Value(::prost::alloc::string::String),
            #[prost(message, tag = "3")]
            Exists(Exists),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ConstraintList {
        #[prost(message, repeated, tag = "1")]
        pub constraints: ::prost::alloc::vec::Vec<super::DynamicParameterConstraints>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Constraint(SingleConstraint),
        #[prost(message, tag = "2")]
        OrConstraints(ConstraintList),
        #[prost(message, tag = "3")]
        AndConstraints(ConstraintList),
        #[prost(message, tag = "4")]
        NotConstraints(::prost::alloc::boxed::Box<super::DynamicParameterConstraints>),
    }
}

/// `envoy.service.discovery.v3.ResourceName`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceName {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub dynamic_parameter_constraints: ::core::option::Option<DynamicParameterConstraints>,
}

/// `envoy.service.discovery.v3.DeltaDiscoveryRequest`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeltaDiscoveryRequest {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
    #[prost(string, tag = "2")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "3")]
    pub resource_names_subscribe: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "4")]
    pub resource_names_unsubscribe: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(map = "string, string", tag = "5")]
    pub initial_resource_versions: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
    #[prost(string, tag = "6")]
    pub response_nonce: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "7")]
    pub error_detail: ::core::option::Option<RpcStatus>,
    #[prost(message, repeated, tag = "8")]
    pub resource_locators_subscribe: ::prost::alloc::vec::Vec<ResourceLocator>,
    #[prost(message, repeated, tag = "9")]
    pub resource_locators_unsubscribe: ::prost::alloc::vec::Vec<ResourceLocator>,
}

/// `envoy.service.discovery.v3.DeltaDiscoveryResponse`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeltaDiscoveryResponse {
    #[prost(string, tag = "1")]
    pub system_version_info: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub resources: ::prost::alloc::vec::Vec<Resource>,
    #[prost(string, tag = "4")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub nonce: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "6")]
    pub removed_resources: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "7")]
    pub control_plane: ::core::option::Option<ControlPlane>,
    #[prost(message, repeated, tag = "8")]
    pub removed_resource_names: ::prost::alloc::vec::Vec<ResourceName>,
}

/// `envoy.service.discovery.v3.Resource`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    #[prost(string, tag = "1")]
    pub version: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub resource: ::core::option::Option<::prost_types::Any>,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "4")]
    pub aliases: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "6")]
    pub ttl: ::core::option::Option<::prost_types::Duration>,
    #[prost(message, optional, tag = "7")]
    pub cache_control: ::core::option::Option<resource::CacheControl>,
    #[prost(message, optional, tag = "8")]
    pub resource_name: ::core::option::Option<ResourceName>,
    #[prost(message, optional, tag = "9")]
    pub metadata: ::core::option::Option<Metadata>,
}

/// Nested message and enum types in `Resource`.
pub mod resource {
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct CacheControl {
        #[prost(bool, tag = "1")]
        pub do_not_cache: bool,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extension configs and Wasm
// ─────────────────────────────────────────────────────────────────────────────

/// `envoy.config.core.v3.TypedExtensionConfig`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedExtensionConfig {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub typed_config: ::core::option::Option<::prost_types::Any>,
}

/// `envoy.extensions.filters.{http,network}.wasm.v3.Wasm`
///
/// Both filter flavours carry the plugin config in field 1.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Wasm {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<PluginConfig>,
}

/// `envoy.extensions.wasm.v3.PluginConfig`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PluginConfig {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub root_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub configuration: ::core::option::Option<::prost_types::Any>,
    #[prost(bool, tag = "5")]
    pub fail_open: bool,
    #[prost(message, optional, tag = "6")]
    pub capability_restriction_config: ::core::option::Option<CapabilityRestrictionConfig>,
    #[prost(enumeration = "FailurePolicy", tag = "7")]
    pub failure_policy: i32,
    #[prost(oneof = "plugin_config::Vm", tags = "3")]
    pub vm: ::core::option::Option<plugin_config::Vm>,
}

/// Nested message and enum types in `PluginConfig`.
pub mod plugin_config {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Vm {
        #[prost(message, tag = "3")]
        VmConfig(super::VmConfig),
    }
}

/// `envoy.extensions.wasm.v3.FailurePolicy`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FailurePolicy {
    Unspecified = 0,
    FailReload = 1,
    FailClosed = 2,
    FailOpen = 3,
}

/// `envoy.extensions.wasm.v3.CapabilityRestrictionConfig`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CapabilityRestrictionConfig {
    #[prost(map = "string, message", tag = "1")]
    pub allowed_capabilities:
        ::std::collections::HashMap<::prost::alloc::string::String, SanitizationConfig>,
}

/// `envoy.extensions.wasm.v3.SanitizationConfig`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SanitizationConfig {}

/// `envoy.extensions.wasm.v3.VmConfig`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VmConfig {
    #[prost(string, tag = "1")]
    pub vm_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub runtime: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub code: ::core::option::Option<AsyncDataSource>,
    #[prost(message, optional, tag = "4")]
    pub configuration: ::core::option::Option<::prost_types::Any>,
    #[prost(bool, tag = "5")]
    pub allow_precompiled: bool,
    #[prost(bool, tag = "6")]
    pub nack_on_code_cache_miss: bool,
    #[prost(message, optional, tag = "7")]
    pub environment_variables: ::core::option::Option<EnvironmentVariables>,
}

/// `envoy.extensions.wasm.v3.EnvironmentVariables`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvironmentVariables {
    #[prost(string, repeated, tag = "1")]
    pub host_env_keys: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(map = "string, string", tag = "2")]
    pub key_values: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

/// `envoy.config.core.v3.AsyncDataSource`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsyncDataSource {
    #[prost(oneof = "async_data_source::Specifier", tags = "1, 2")]
    pub specifier: ::core::option::Option<async_data_source::Specifier>,
}

/// Nested message and enum types in `AsyncDataSource`.
pub mod async_data_source {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Specifier {
        #[prost(message, tag = "1")]
        Local(super::DataSource),
        #[prost(message, tag = "2")]
        Remote(super::RemoteDataSource),
    }
}

/// `envoy.config.core.v3.DataSource`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataSource {
    #[prost(message, optional, tag = "5")]
    pub watched_directory: ::core::option::Option<WatchedDirectory>,
    #[prost(oneof = "data_source::Specifier", tags = "1, 2, 3, 4")]
    pub specifier: ::core::option::Option<data_source::Specifier>,
}

/// Nested message and enum types in `DataSource`.
pub mod data_source {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Specifier {
        #[prost(string, tag = "1")]
        Filename(::prost::alloc::string::String),
        #[prost(bytes, tag = "2")]
        InlineBytes(::prost::alloc::vec::Vec<u8>),
        #[prost(string, tag = "3")]
        InlineString(::prost::alloc::string::String),
        #[prost(string, tag = "4")]
        EnvironmentVariable(::prost::alloc::string::String),
    }
}

/// `envoy.config.core.v3.WatchedDirectory`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WatchedDirectory {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
}

/// `envoy.config.core.v3.RemoteDataSource`
///
/// Read-only on the forwarding path; `retry_policy` (3) is not declared.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoteDataSource {
    #[prost(message, optional, tag = "1")]
    pub http_uri: ::core::option::Option<HttpUri>,
    #[prost(string, tag = "2")]
    pub sha256: ::prost::alloc::string::String,
}

/// `envoy.config.core.v3.HttpUri`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpUri {
    #[prost(string, tag = "1")]
    pub uri: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub cluster: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub timeout: ::core::option::Option<::prost_types::Duration>,
}
