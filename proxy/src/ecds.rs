//! Extension config (ECDS) translation
//!
//! Wasm filters delivered through ECDS may point their VM code at a remote
//! location. The data plane should only ever see a local file, so every
//! response of type [`type_url::EXTENSION_CONFIG`] passes through
//! [`EcdsTranslator::translate`] before it goes downstream:
//!
//! ```text
//! remote code ──resolve──► Ready   ──► rewrite to local { filename }
//!                          Pending ──► leave the resource out
//!                          Failed  ──► NACK the whole response upstream
//! ```

use crate::metrics::with_metrics;
use crate::module_cache::ModuleCacheHandle;
use silta_core::proto::{
    self, AsyncDataSource, DataSource, RemoteDataSource, RpcStatus, TypedExtensionConfig, Wasm,
    async_data_source, data_source, plugin_config,
};
use silta_core::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, ModuleCache, ModuleRef, Resolution, Resource,
    type_url,
};
use tracing::{debug, warn};

/// What to do with an upstream ECDS response
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Send this (possibly rewritten) response downstream
    Forward(DeltaDiscoveryResponse),
    /// Send nothing downstream; a module is still being fetched
    Withhold,
    /// Send this NACK upstream instead
    Nack(DeltaDiscoveryRequest),
}

impl Translation {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Translation::Forward(_) => "forward",
            Translation::Withhold => "withhold",
            Translation::Nack(_) => "nack",
        }
    }
}

/// Per-resource result
enum ResourceOutcome {
    Deliver(Resource),
    Pending,
    Failed(String),
}

/// Rewrites remote Wasm module references in ECDS responses
#[derive(Debug, Clone)]
pub struct EcdsTranslator {
    cache: ModuleCacheHandle,
}

impl EcdsTranslator {
    /// Create a translator consulting the given cache handle
    pub fn new(cache: ModuleCacheHandle) -> Self {
        Self { cache }
    }

    /// Whether responses of `type_url` need translation
    pub fn applies_to(type_url: &str) -> bool {
        type_url == type_url::EXTENSION_CONFIG
    }

    /// Translate one response
    pub async fn translate(&self, mut response: DeltaDiscoveryResponse) -> Translation {
        let cache = self.cache.get();
        let resources = std::mem::take(&mut response.resources);

        let mut delivered = Vec::with_capacity(resources.len());
        let mut failures = Vec::new();
        let mut pending = 0usize;

        for resource in resources {
            match translate_resource(cache.as_ref(), resource).await {
                ResourceOutcome::Deliver(resource) => delivered.push(resource),
                ResourceOutcome::Pending => pending += 1,
                ResourceOutcome::Failed(reason) => failures.push(reason),
            }
        }

        if !failures.is_empty() {
            let reason = failures.join("; ");
            warn!(
                nonce = %response.nonce,
                failed = failures.len(),
                reason = %reason,
                "Rejecting extension config response"
            );
            with_metrics(|m| m.nacks_synthesized.inc());
            return Translation::Nack(nack_for(&response, reason));
        }

        if delivered.is_empty() && pending > 0 && response.removed_resources.is_empty() {
            debug!(nonce = %response.nonce, pending, "Withholding extension config response");
            with_metrics(|m| m.responses_withheld.inc());
            return Translation::Withhold;
        }

        if pending > 0 {
            debug!(
                nonce = %response.nonce,
                pending,
                delivered = delivered.len(),
                "Forwarding partial extension config response"
            );
        }
        response.resources = delivered;
        Translation::Forward(response)
    }
}

/// Build the NACK rejecting `response`
pub fn nack_for(response: &DeltaDiscoveryResponse, message: String) -> DeltaDiscoveryRequest {
    DeltaDiscoveryRequest {
        type_url: response.type_url.clone(),
        response_nonce: response.nonce.clone(),
        error_detail: Some(RpcStatus {
            code: tonic::Code::Internal as i32,
            message,
            details: Vec::new(),
        }),
        ..Default::default()
    }
}

async fn translate_resource(cache: &dyn ModuleCache, mut resource: Resource) -> ResourceOutcome {
    let Some(any) = resource.resource.as_ref() else {
        return ResourceOutcome::Deliver(resource);
    };

    let mut ext: TypedExtensionConfig = match proto::unpack(any, type_url::EXTENSION_CONFIG) {
        Ok(ext) => ext,
        Err(e) => return ResourceOutcome::Failed(format!("{}: {e}", resource.name)),
    };

    let Some(filter_type) = ext
        .typed_config
        .as_ref()
        .and_then(|c| type_url::wasm_filter(&c.type_url))
    else {
        return ResourceOutcome::Deliver(resource);
    };

    let mut wasm: Wasm = match ext.typed_config.as_ref().map(|c| proto::unpack(c, filter_type)) {
        Some(Ok(wasm)) => wasm,
        Some(Err(e)) => {
            return ResourceOutcome::Failed(format!("{}: wasm filter: {e}", resource.name));
        }
        None => return ResourceOutcome::Deliver(resource),
    };

    let Some(code) = vm_code_mut(&mut wasm) else {
        return ResourceOutcome::Deliver(resource);
    };
    let module = match &code.specifier {
        Some(async_data_source::Specifier::Remote(remote)) => {
            match module_ref(remote, &resource) {
                Some(module) => module,
                None => {
                    return ResourceOutcome::Failed(format!(
                        "{}: remote code source has no uri",
                        resource.name
                    ));
                }
            }
        }
        _ => return ResourceOutcome::Deliver(resource),
    };

    let resolution = cache.resolve(&module).await;
    with_metrics(|m| m.record_resolution(resolution.as_str()));
    debug!(
        resource = %resource.name,
        version = %resource.version,
        uri = %module.uri,
        cache = cache.name(),
        outcome = resolution.as_str(),
        "Resolved wasm module"
    );

    match resolution {
        Resolution::Ready(artifact) => {
            code.specifier = Some(async_data_source::Specifier::Local(DataSource {
                specifier: Some(data_source::Specifier::Filename(artifact.filename())),
                watched_directory: None,
            }));
            ext.typed_config = Some(proto::pack(filter_type, &wasm));
            resource.resource = Some(proto::pack(type_url::EXTENSION_CONFIG, &ext));
            ResourceOutcome::Deliver(resource)
        }
        Resolution::Pending => ResourceOutcome::Pending,
        Resolution::Failed(reason) => ResourceOutcome::Failed(reason),
    }
}

fn vm_code_mut(wasm: &mut Wasm) -> Option<&mut AsyncDataSource> {
    match wasm.config.as_mut()?.vm.as_mut()? {
        plugin_config::Vm::VmConfig(vm) => vm.code.as_mut(),
    }
}

fn module_ref(remote: &RemoteDataSource, resource: &Resource) -> Option<ModuleRef> {
    let uri = remote.http_uri.as_ref().map(|h| h.uri.as_str())?;
    if uri.is_empty() {
        return None;
    }
    Some(
        ModuleRef::new(uri)
            .with_sha256(remote.sha256.clone())
            .for_resource(resource.name.clone(), resource.version.clone()),
    )
}

// ==== TESTS ====
