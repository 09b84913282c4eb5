//! Plain-HTTP health-probe and metrics servers (spec.md §6: "`/healthz` and
//! `/readyz` endpoints... served on the configured health-probe address").
//!
//! Built the same way `fleetctl-admission`'s server is: hyper + a bare
//! `TcpListener` accept loop, `tokio_util::CancellationToken` for shutdown.
//! Unlike the admission server this one carries no TLS, matching how
//! cluster API servers typically expose liveness/readiness over plain HTTP
//! on a separate port from anything mutually authenticated.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleetctl_runtime::Metrics;

/// Flips to `true` once startup has finished wiring stores, leader
/// election, and worker pools; `/readyz` reports it, `/healthz` does not
/// (a process that is alive but not yet ready should still not be killed).
#[derive(Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicBool>);

impl ReadinessFlag {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serves `/healthz` and `/readyz` until `shutdown` is cancelled.
pub async fn serve_health(addr: SocketAddr, readiness: ReadinessFlag, shutdown: CancellationToken) -> std::io::Result<()> {
    serve(addr, shutdown, move |req| {
        let readiness = readiness.clone();
        async move { route_health(req, &readiness) }
    })
    .await
}

/// Serves `/metrics` in Prometheus text format until `shutdown` is
/// cancelled.
pub async fn serve_metrics(addr: SocketAddr, metrics: Arc<Metrics>, shutdown: CancellationToken) -> std::io::Result<()> {
    serve(addr, shutdown, move |req| {
        let metrics = metrics.clone();
        async move { route_metrics(req, &metrics) }
    })
    .await
}

async fn serve<F, Fut>(addr: SocketAddr, shutdown: CancellationToken, handler: F) -> std::io::Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = Response<Full<Bytes>>> + Send,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "serving");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(%addr, "shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let handler = handler.clone();
                        async move { Ok::<_, Infallible>(handler(req).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        warn!(%peer, error = %e, "connection error");
                    }
                });
            }
        }
    }
}

fn route_health(req: Request<Incoming>, readiness: &ReadinessFlag) -> Response<Full<Bytes>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok"),
        (&Method::GET, "/readyz") => {
            if readiness.is_ready() {
                text_response(StatusCode::OK, "ok")
            } else {
                text_response(StatusCode::SERVICE_UNAVAILABLE, "not ready")
            }
        }
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn route_metrics(req: Request<Incoming>, metrics: &Metrics) -> Response<Full<Bytes>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => text_response(StatusCode::OK, &metrics.render()),
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::copy_from_slice(body.as_bytes())))
        .expect("static response is always well-formed")
}
