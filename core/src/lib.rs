//! silta-core - Core types for the SILTA xDS proxy
//!
//! This crate provides the pieces shared between the proxy, its runtime and
//! external module fetchers:
//!
//! - [`proto`] - the delta xDS wire subset and the generated
//!   `AggregatedDiscoveryService` client/server
//! - [`ModuleCache`] / [`ModuleFetcher`] - the contract for resolving remote
//!   Wasm modules to local artifacts
//! - [`FetchError`] / [`UnpackError`] - error types for those seams
//! - [`type_url`] - well-known xDS type URLs
//!
//! # Why this crate exists
//!
//! Module fetchers (OCI pullers, HTTP downloaders) live outside the proxy and
//! only need the cache contract. Keeping it here lets them build without
//! pulling in the proxy's server stack.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod error;
/// Module cache contract
pub mod module;
/// Well-known type URLs
pub mod type_url;

/// Delta xDS wire types and the generated ADS service
pub mod proto {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::derive_partial_eq_without_eq)]
    #![allow(missing_docs)]

    include!("proto/xds.v3.rs");
    include!(concat!(
        env!("OUT_DIR"),
        "/envoy.service.discovery.v3.AggregatedDiscoveryService.rs"
    ));

    use crate::error::UnpackError;
    use prost::Message;

    /// Wrap a message in an `Any` with the given type URL
    pub fn pack<M: Message>(type_url: &str, msg: &M) -> ::prost_types::Any {
        ::prost_types::Any {
            type_url: type_url.to_string(),
            value: msg.encode_to_vec(),
        }
    }

    /// Decode an `Any`, checking its type URL first
    pub fn unpack<M: Message + Default>(
        any: &::prost_types::Any,
        type_url: &'static str,
    ) -> Result<M, UnpackError> {
        if any.type_url != type_url {
            return Err(UnpackError::TypeMismatch {
                expected: type_url,
                actual: any.type_url.clone(),
            });
        }
        Ok(M::decode(any.value.as_slice())?)
    }
}

pub use error::{FetchError, UnpackError};
pub use module::{ArtifactDescriptor, ModuleCache, ModuleFetcher, ModuleRef, Resolution};
pub use proto::{DeltaDiscoveryRequest, DeltaDiscoveryResponse, Node, Resource};
