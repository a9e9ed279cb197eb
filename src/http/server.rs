//! Forwarding engine.
//!
//! # Responsibilities
//! - Create the axum Router for the catch-all mount
//! - Wire up request logging
//! - Run every request through the director and forward it upstream
//! - Stream the upstream response back to the client
//! - Splice upgraded connections (WebSocket) after a 101
//! - Map upstream failures to 502 Bad Gateway

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::http::director::Director;
use crate::http::upstream::{build_client, UpstreamClient};
use crate::net::connection::{accept_loop, Connections};
use crate::net::listener::Listener;
use crate::observability::logging::request_trace_layer;
use crate::routing::Mount;
use crate::security::headers::{
    append_forwarded_for, restore_upgrade, strip_hop_by_hop, upgrade_type,
};

/// Errors building a forwarding engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load TLS root certificates: {0}")]
    TlsRoots(std::io::Error),
}

/// State injected into the forwarding handler.
struct EngineState {
    director: Director,
    client: UpstreamClient,
}

/// One upstream, one credential, one director: not yet bound to a listener.
pub struct ForwardingEngine {
    config: EngineConfig,
    router: Router,
}

impl ForwardingEngine {
    /// Build an engine for the validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = build_client(&config.upstream)?;
        let mount = Mount::catch_all();
        let state = Arc::new(EngineState {
            director: Director::new(config.upstream.clone(), config.credential.clone(), mount),
            client,
        });

        let router = Self::build_router(&mount, state);
        Ok(Self { config, router })
    }

    /// Build the axum router for the mount.
    fn build_router(mount: &Mount, state: Arc<EngineState>) -> Router {
        let [wildcard, prefix] = mount.route_patterns();
        Router::new()
            .route(&wildcard, any(forward))
            .route(&prefix, any(forward))
            .with_state(state)
            .layer(request_trace_layer())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine's router, for serving without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Start accepting connections on `listener`.
    pub fn serve(self, listener: Listener) -> RunningEngine {
        let mut running = RunningEngine {
            config: self.config,
            router: self.router,
            local_addr: listener.local_addr(),
            listener: None,
            stop_tx: None,
            accept_task: None,
        };
        running.resume(listener);
        running
    }
}

/// An engine bound to a listener and accepting connections.
pub struct RunningEngine {
    config: EngineConfig,
    router: Router,
    local_addr: SocketAddr,
    listener: Option<Listener>,
    stop_tx: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<Connections>>,
}

impl RunningEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Address of the socket this engine accepts (or last accepted) on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound socket, for handing over to a successor engine.
    pub fn listener(&self) -> Option<Listener> {
        self.listener.clone()
    }

    /// Start an accept loop on `listener`. Any previous loop must have been
    /// stopped with [`RunningEngine::stop_accepting`].
    pub fn resume(&mut self, listener: Listener) {
        tracing::info!(
            address = %listener.local_addr(),
            upstream = %self.config.upstream,
            "Listening, forwarding requests"
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(listener.clone(), self.router.clone(), stop_rx));

        self.local_addr = listener.local_addr();
        self.listener = Some(listener);
        self.stop_tx = Some(stop_tx);
        self.accept_task = Some(accept_task);
    }

    /// Stop accepting new connections.
    ///
    /// Returns once the accept loop has exited, handing back the connections
    /// still in flight so the caller can drain them.
    pub async fn stop_accepting(&mut self) -> Connections {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }

        match self.accept_task.take() {
            Some(task) => match task.await {
                Ok(connections) => connections,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept loop ended abnormally");
                    Connections::new()
                }
            },
            None => Connections::new(),
        }
    }

    /// Give up this engine's share of the socket.
    ///
    /// The port is free once no successor holds a clone.
    pub fn close_listener(&mut self) {
        self.listener = None;
    }
}

impl Drop for RunningEngine {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Catch-all handler: direct, forward, relay.
async fn forward(State(state): State<Arc<EngineState>>, mut request: Request<Body>) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Err(e) = state.director.direct(&mut request) {
        tracing::warn!(error = %e, "Failed to rewrite request for upstream");
        return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
    }

    let upgrade = upgrade_type(request.headers());
    strip_hop_by_hop(request.headers_mut());
    if let Some(protocol) = &upgrade {
        restore_upgrade(request.headers_mut(), protocol.clone());
    }
    if let Some(ip) = client_ip {
        append_forwarded_for(request.headers_mut(), ip);
    }
    *request.version_mut() = Version::HTTP_11;

    let client_upgrade = upgrade.is_some().then(|| hyper::upgrade::on(&mut request));

    match state.client.request(request).await {
        Ok(response) => {
            if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                if let Some(client_upgrade) = client_upgrade {
                    return switch_protocols(client_upgrade, response);
                }
            }

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::warn!(
                upstream = %state.director.upstream(),
                error = %e,
                "Upstream request failed"
            );
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Relay a `101 Switching Protocols` and splice both connections once the
/// client side has switched too.
fn switch_protocols(client: OnUpgrade, mut response: hyper::Response<Incoming>) -> Response {
    let upstream = hyper::upgrade::on(&mut response);
    let protocol = upgrade_type(response.headers());

    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client, upstream) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Protocol upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);
        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((sent, received)) => {
                tracing::debug!(sent, received, "Upgraded connection closed");
            }
            Err(e) => tracing::debug!(error = %e, "Upgraded connection ended with error"),
        }
    });

    let (mut parts, _) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    if let Some(protocol) = protocol {
        restore_upgrade(&mut parts.headers, protocol);
    }
    Response::from_parts(parts, Body::empty())
}
