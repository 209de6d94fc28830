use tonic_build::manual::{Builder, Method, Service};

fn main() {
    // Message types live in src/proto/xds.v3.rs (checked in), so only the
    // service plumbing is generated here. The manual builder needs no protoc.
    println!("cargo:rerun-if-changed=build.rs");

    let delta = Method::builder()
        .name("delta_aggregated_resources")
        .route_name("DeltaAggregatedResources")
        .input_type("crate::proto::DeltaDiscoveryRequest")
        .output_type("crate::proto::DeltaDiscoveryResponse")
        .codec_path("tonic::codec::ProstCodec")
        .client_streaming()
        .server_streaming()
        .build();

    let ads = Service::builder()
        .name("AggregatedDiscoveryService")
        .package("envoy.service.discovery.v3")
        .method(delta)
        .build();

    Builder::new()
        .build_client(true)
        .build_server(true)
        .compile(&[ads]);
}
