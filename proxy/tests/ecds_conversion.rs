//! Extension config localization through a live proxy

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use silta_proxy::proto::{async_data_source, data_source};
use silta_proxy::{
    ArtifactDescriptor, FetchingModuleCache, FileFetcher, ForwarderOptions, Resolution, type_url,
};
use std::sync::Arc;
use std::time::Duration;

const EXTENSION: &str = "extension-config";

fn local_filename(resource: &silta_proxy::Resource) -> String {
    match wasm_code(resource) {
        async_data_source::Specifier::Local(local) => match local.specifier {
            Some(data_source::Specifier::Filename(name)) => name,
            other => panic!("expected filename, got {other:?}"),
        },
        other => panic!("expected local code, got {other:?}"),
    }
}

// ============================================================================
// Ready
// ============================================================================

#[tokio::test]
async fn test_ready_module_delivered_as_local_file() {
    let (upstream, _fixture) = start_control_plane(FixtureOptions::default()).await;
    let cache = Arc::new(StaticCache(Resolution::Ready(ArtifactDescriptor::new("test"))));
    let (addr, _proxy) = start_proxy(upstream, cache, ForwarderOptions::default()).await;

    let mut client = connect(addr).await;
    let (tx, mut responses) = open(&mut client).await.unwrap();
    tx.send(with_node(subscribe(type_url::EXTENSION_CONFIG, &[EXTENSION])))
        .await
        .unwrap();

    let response = next_response(&mut responses).await.unwrap();
    assert_eq!(response.type_url, type_url::EXTENSION_CONFIG);
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name, EXTENSION);
    assert_eq!(local_filename(&response.resources[0]), "test");
}

#[tokio::test]
async fn test_file_module_resolved_by_fetching_cache() {
    let path = std::env::temp_dir().join(format!("silta-ecds-{}.wasm", std::process::id()));
    tokio::fs::write(&path, b"\0asm\x01\0\0\0").await.unwrap();

    let (upstream, _fixture) = start_control_plane(FixtureOptions {
        module_uri: format!("file://{}", path.display()),
        ..Default::default()
    })
    .await;
    let cache = Arc::new(FetchingModuleCache::new(
        Arc::new(FileFetcher::new()),
        Duration::from_secs(2),
        Duration::from_secs(1),
    ));
    let (addr, _proxy) = start_proxy(upstream, cache, ForwarderOptions::default()).await;

    let mut client = connect(addr).await;
    let (tx, mut responses) = open(&mut client).await.unwrap();
    tx.send(with_node(subscribe(type_url::EXTENSION_CONFIG, &[EXTENSION])))
        .await
        .unwrap();

    let response = next_response(&mut responses).await.unwrap();
    assert_eq!(
        local_filename(&response.resources[0]),
        path.display().to_string()
    );

    tokio::fs::remove_file(&path).await.ok();
}

// ============================================================================
// Failed
// ============================================================================

#[tokio::test]
async fn test_failed_module_nacked_upstream() {
    let (upstream, fixture) = start_control_plane(FixtureOptions::default()).await;
    let cache = Arc::new(StaticCache(Resolution::Failed("fetch refused".to_string())));
    let (addr, proxy) = start_proxy(upstream, cache, ForwarderOptions::default()).await;

    let mut client = connect(addr).await;
    let (tx, mut responses) = open(&mut client).await.unwrap();
    tx.send(with_node(subscribe(type_url::EXTENSION_CONFIG, &[EXTENSION])))
        .await
        .unwrap();

    assert!(
        eventually(Duration::from_secs(5), || {
            proxy.sessions().first().is_some_and(|s| {
                s.nonces
                    .last_processed(type_url::EXTENSION_CONFIG)
                    .is_some()
            })
        })
        .await,
        "ECDS nonce never marked processed"
    );

    let (_, pushed_nonce) = fixture
        .sent()
        .into_iter()
        .find(|(t, _)| t == type_url::EXTENSION_CONFIG)
        .unwrap();
    let session = &proxy.sessions()[0];
    assert_eq!(
        session.nonces.last_processed(type_url::EXTENSION_CONFIG).as_deref(),
        Some(pushed_nonce.as_str())
    );
    assert!(session.nonces.current(type_url::EXTENSION_CONFIG).is_none());

    assert!(eventually(Duration::from_secs(5), || fixture.nacks().len() == 1).await);
    let nack = &fixture.nacks()[0];
    assert_eq!(nack.type_url, type_url::EXTENSION_CONFIG);
    assert_eq!(nack.response_nonce, pushed_nonce);
    assert_eq!(nack.node.as_ref().unwrap().id, node().id);
    let detail = nack.error_detail.as_ref().unwrap();
    assert_eq!(detail.code, tonic::Code::Internal as i32);
    assert!(detail.message.contains("fetch refused"));

    // Nothing reaches the data plane
    let nothing = tokio::time::timeout(Duration::from_millis(200), responses.message()).await;
    assert!(nothing.is_err());
}

// ============================================================================
// Pending
// ============================================================================

#[tokio::test]
async fn test_pending_module_withheld_until_cache_swapped() {
    let (upstream, fixture) = start_control_plane(FixtureOptions::default()).await;
    let (addr, proxy) = start_proxy(
        upstream,
        Arc::new(StaticCache(Resolution::Pending)),
        ForwarderOptions::default(),
    )
    .await;

    let mut client = connect(addr).await;
    let (tx, mut responses) = open(&mut client).await.unwrap();
    tx.send(with_node(subscribe(type_url::EXTENSION_CONFIG, &[EXTENSION])))
        .await
        .unwrap();

    assert!(eventually(Duration::from_secs(5), || fixture.sent().len() == 1).await);
    let withheld = tokio::time::timeout(Duration::from_millis(300), responses.message()).await;
    assert!(withheld.is_err(), "pending module must not be delivered");
    assert!(fixture.nacks().is_empty());

    proxy.set_module_cache(Arc::new(StaticCache(Resolution::Ready(
        ArtifactDescriptor::new("test"),
    ))));

    // The control plane pushes again on resubscription
    tx.send(subscribe(type_url::EXTENSION_CONFIG, &[EXTENSION]))
        .await
        .unwrap();
    let response = next_response(&mut responses).await.unwrap();
    assert_eq!(local_filename(&response.resources[0]), "test");
    assert_eq!(
        proxy.sessions()[0]
            .nonces
            .current(type_url::EXTENSION_CONFIG)
            .as_deref(),
        Some(response.nonce.as_str())
    );
}

#[tokio::test]
async fn test_other_types_unaffected_by_failing_cache() {
    let (upstream, fixture) = start_control_plane(FixtureOptions::default()).await;
    let cache = Arc::new(StaticCache(Resolution::Failed("offline".to_string())));
    let (addr, _proxy) = start_proxy(upstream, cache, ForwarderOptions::default()).await;

    let mut client = connect(addr).await;
    let (tx, mut responses) = open(&mut client).await.unwrap();
    tx.send(with_node(subscribe(type_url::CLUSTER, &["backend"])))
        .await
        .unwrap();

    let response = next_response(&mut responses).await.unwrap();
    assert_eq!(response.type_url, type_url::CLUSTER);
    assert!(fixture.nacks().is_empty());
}
