//! Stream forwarder - one per proxied session
//!
//! # Architecture
//!
//! ```text
//!  downstream ──read──► forward_requests ──► [upstream queue] ──► control plane
//!                                                ▲
//!                                                │ NACKs
//!  data plane ◄── [downstream queue] ◄── forward_responses ◄──read── upstream
//! ```
//!
//! Each loop runs as its own task so a stall on one peer never blocks reads
//! from the other. The two share only the nonce tracker and the bounded
//! queues. Both origins feed one FIFO upstream queue, so a synthesized NACK
//! goes out after every downstream request already enqueued.
//!
//! Enqueueing waits at most `send_timeout` for capacity; after that the
//! session ends with `RESOURCE_EXHAUSTED`. Whichever loop exits first raises
//! the session's stop signal, and every await point in the other loop races
//! against it. Once both loops are done all senders and stream handles are
//! dropped, which closes both HTTP/2 streams.

use crate::config::ForwarderOptions;
use crate::ecds::{EcdsTranslator, Translation};
use crate::error::{Direction, SiltaError};
use crate::metrics::{Metrics, with_metrics};
use crate::nonce::{NonceTracker, RequestKind};
use crate::session::SessionGuard;
use silta_core::{DeltaDiscoveryRequest, DeltaDiscoveryResponse, Node, type_url};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, error, info, warn};

/// Item type of the downstream queue
pub type DownstreamItem = Result<DeltaDiscoveryResponse, Status>;

/// Resolve once `signal` reads `true`
///
/// Never resolves if every sender is gone without raising it.
pub(crate) async fn stopped(signal: &mut watch::Receiver<bool>) {
    loop {
        let raised = *signal.borrow_and_update();
        if raised {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Bounded queue toward one peer with a send deadline
struct Outbound<T> {
    tx: mpsc::Sender<T>,
    direction: Direction,
    timeout: Duration,
}

impl<T> Clone for Outbound<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            direction: self.direction,
            timeout: self.timeout,
        }
    }
}

impl<T: Send> Outbound<T> {
    fn new(tx: mpsc::Sender<T>, direction: Direction, timeout: Duration) -> Self {
        Self {
            tx,
            direction,
            timeout,
        }
    }

    async fn send(&self, item: T, stop: &mut watch::Receiver<bool>) -> Result<(), SiltaError> {
        tokio::select! {
            biased;
            _ = stopped(stop) => Err(SiltaError::Shutdown),
            sent = self.tx.send_timeout(item, self.timeout) => match sent {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(SiltaError::Backpressure {
                    direction: self.direction,
                    waited: self.timeout,
                }),
                Err(SendTimeoutError::Closed(_)) => Err(SiltaError::PeerClosed(self.direction)),
            },
        }
    }
}

/// State shared by both loops of a session
struct Shared {
    session: SessionGuard,
    node: OnceLock<Node>,
    nonces: Arc<NonceTracker>,
    translator: EcdsTranslator,
}

/// Bridges one downstream and one upstream delta stream
pub struct StreamForwarder {
    session: SessionGuard,
    nonces: Arc<NonceTracker>,
    translator: EcdsTranslator,
    options: ForwarderOptions,
    shutdown: watch::Receiver<bool>,
}

impl StreamForwarder {
    /// Create a forwarder for a registered session
    ///
    /// `shutdown` is the proxy-wide stop signal.
    pub fn new(
        session: SessionGuard,
        nonces: Arc<NonceTracker>,
        translator: EcdsTranslator,
        options: ForwarderOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            nonces,
            translator,
            options,
            shutdown,
        }
    }

    /// Run the session to completion
    ///
    /// `open_upstream` yields the upstream response stream; it is awaited by
    /// the response loop while the request loop already feeds `upstream_tx`.
    /// Returns the reason the session ended.
    pub async fn run<D, U, F>(
        self,
        downstream: D,
        open_upstream: F,
        upstream_tx: mpsc::Sender<DeltaDiscoveryRequest>,
        downstream_tx: mpsc::Sender<DownstreamItem>,
    ) -> SiltaError
    where
        D: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Unpin + Send + 'static,
        U: Stream<Item = Result<DeltaDiscoveryResponse, Status>> + Unpin + Send + 'static,
        F: Future<Output = Result<U, SiltaError>> + Send + 'static,
    {
        let StreamForwarder {
            session,
            nonces,
            translator,
            options,
            mut shutdown,
        } = self;
        let session_id = session.id();
        with_metrics(Metrics::session_started);
        debug!(session_id, "Session started");

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let final_tx = downstream_tx.clone();

        let upstream = Outbound::new(upstream_tx, Direction::Upstream, options.send_timeout);
        let downstream_out =
            Outbound::new(downstream_tx, Direction::Downstream, options.send_timeout);
        let shared = Arc::new(Shared {
            session,
            node: OnceLock::new(),
            nonces,
            translator,
        });

        let requests = {
            let stop_tx = Arc::clone(&stop_tx);
            let work = forward_requests(
                Arc::clone(&shared),
                downstream,
                upstream.clone(),
                stop_tx.subscribe(),
            );
            tokio::spawn(async move {
                let reason = work.await;
                stop_tx.send_replace(true);
                reason
            })
        };

        let responses = {
            let stop_tx = Arc::clone(&stop_tx);
            let work = forward_responses(
                Arc::clone(&shared),
                open_upstream,
                downstream_out,
                upstream,
                stop_tx.subscribe(),
            );
            tokio::spawn(async move {
                let reason = work.await;
                stop_tx.send_replace(true);
                reason
            })
        };

        tokio::select! {
            _ = stopped(&mut shutdown) => {
                stop_tx.send_replace(true);
            }
            _ = stopped(&mut stop_rx) => {}
        }

        let from_requests = joined(requests.await);
        let from_responses = joined(responses.await);
        let reason = match (from_requests, from_responses) {
            (SiltaError::Shutdown, other) => other,
            (first, _) => first,
        };

        if let Some(status) = reason.downstream_status() {
            // Best effort: a full queue means nobody is reading anyway
            let _ = final_tx.try_send(Err(status));
        }

        let elapsed = shared.session.elapsed();
        with_metrics(|m| m.session_ended(reason.reason(), elapsed.as_secs_f64()));
        match &reason {
            SiltaError::PeerClosed(_) | SiltaError::Downstream(_) | SiltaError::Shutdown => {
                info!(
                    session_id,
                    reason = reason.reason(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Session closed"
                );
            }
            other => {
                warn!(
                    session_id,
                    reason = other.reason(),
                    error = %other,
                    duration_ms = elapsed.as_millis() as u64,
                    "Session terminated"
                );
            }
        }
        reason
    }
}

fn joined(result: Result<SiltaError, tokio::task::JoinError>) -> SiltaError {
    match result {
        Ok(reason) => reason,
        Err(e) => {
            error!(error = %e, "Forwarder task failed");
            SiltaError::Shutdown
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Downstream → upstream
// ─────────────────────────────────────────────────────────────────────────────

async fn forward_requests<D>(
    shared: Arc<Shared>,
    mut downstream: D,
    upstream: Outbound<DeltaDiscoveryRequest>,
    mut stop: watch::Receiver<bool>,
) -> SiltaError
where
    D: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Unpin + Send,
{
    let session_id = shared.session.id();

    loop {
        let next = tokio::select! {
            biased;
            _ = stopped(&mut stop) => return SiltaError::Shutdown,
            next = downstream.next() => next,
        };

        let mut request = match next {
            Some(Ok(request)) => request,
            Some(Err(status)) => return SiltaError::Downstream(status),
            None => return SiltaError::PeerClosed(Direction::Downstream),
        };

        match shared.node.get() {
            Some(node) => {
                if request.node.is_none() {
                    request.node = Some(node.clone());
                }
            }
            None => match &request.node {
                Some(node) => {
                    shared.session.set_node_id(&node.id);
                    info!(session_id, node_id = %node.id, "Session established");
                    let _ = shared.node.set(node.clone());
                }
                None => return SiltaError::MissingNode,
            },
        }

        let kind = shared.nonces.classify(&request);
        if kind == RequestKind::Stale {
            debug!(
                session_id,
                type_url = %request.type_url,
                nonce = %request.response_nonce,
                "Forwarding request with stale nonce"
            );
        }

        let type_url = request.type_url.clone();
        let nonce = request.response_nonce.clone();
        if let Err(e) = upstream.send(request, &mut stop).await {
            return e;
        }

        if !nonce.is_empty() {
            shared.nonces.record_processed(&type_url, &nonce);
        }
        with_metrics(|m| m.record_request(&type_url, kind.as_str()));
        debug!(
            session_id,
            type_url = type_url::short_name(&type_url),
            nonce = %nonce,
            kind = kind.as_str(),
            "Request forwarded upstream"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream → downstream (NACKs loop back upstream)
// ─────────────────────────────────────────────────────────────────────────────

async fn forward_responses<F, U>(
    shared: Arc<Shared>,
    open_upstream: F,
    downstream: Outbound<DownstreamItem>,
    upstream: Outbound<DeltaDiscoveryRequest>,
    mut stop: watch::Receiver<bool>,
) -> SiltaError
where
    F: Future<Output = Result<U, SiltaError>> + Send,
    U: Stream<Item = Result<DeltaDiscoveryResponse, Status>> + Unpin + Send,
{
    let session_id = shared.session.id();

    let mut responses = tokio::select! {
        biased;
        _ = stopped(&mut stop) => return SiltaError::Shutdown,
        opened = open_upstream => match opened {
            Ok(stream) => stream,
            Err(e) => return e,
        },
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = stopped(&mut stop) => return SiltaError::Shutdown,
            next = responses.next() => next,
        };

        let response = match next {
            Some(Ok(response)) => response,
            Some(Err(status)) => return SiltaError::Upstream(status),
            None => return SiltaError::PeerClosed(Direction::Upstream),
        };

        let response = if EcdsTranslator::applies_to(&response.type_url) {
            let translation = tokio::select! {
                biased;
                _ = stopped(&mut stop) => return SiltaError::Shutdown,
                translation = shared.translator.translate(response) => translation,
            };

            match translation {
                Translation::Forward(response) => response,
                Translation::Withhold => continue,
                Translation::Nack(mut nack) => {
                    if nack.node.is_none() {
                        nack.node = shared.node.get().cloned();
                    }
                    let type_url = nack.type_url.clone();
                    let nonce = nack.response_nonce.clone();
                    if let Err(e) = upstream.send(nack, &mut stop).await {
                        return e;
                    }
                    shared.nonces.record_processed(&type_url, &nonce);
                    with_metrics(|m| m.record_request(&type_url, RequestKind::Nack.as_str()));
                    info!(session_id, nonce = %nonce, "NACK sent upstream for extension config");
                    continue;
                }
            }
        } else {
            response
        };

        let type_url = response.type_url.clone();
        let nonce = response.nonce.clone();
        let count = response.resources.len();
        if let Err(e) = downstream.send(Ok(response), &mut stop).await {
            return e;
        }

        shared.nonces.record_sent(&type_url, &nonce);
        with_metrics(|m| m.record_response(&type_url));
        debug!(
            session_id,
            type_url = type_url::short_name(&type_url),
            nonce = %nonce,
            resources = count,
            "Response forwarded downstream"
        );
    }
}

// ==== TESTS ====
