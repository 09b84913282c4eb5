//! HTTPS server exposing the admission endpoints (spec.md 6): `/mutate`
//! and `/validate` accept the admission request/response JSON envelope;
//! `/healthz` returns 200 once the handler is ready.
//!
//! Built on hyper and `tokio_rustls` rather than the teacher's mio event
//! loop: the rest of this workspace is tokio-based, and a synchronous
//! per-request handler has no need for a hand-rolled reactor.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request as HttpRequest, Response as HttpResponse, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{AdmissionError, Result};
use crate::tls::TlsConfig;
use crate::webhook::{self, AdmissionConfig, AdmissionRequest};

/// Wire envelope for an admission request, decoded from the request body.
#[derive(Debug, serde::Deserialize)]
struct WireRequest {
    uid: String,
    operation: WireOperation,
    object: serde_json::Value,
    #[serde(default)]
    old_object: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum WireOperation {
    Create,
    Update,
    Delete,
}

impl From<WireOperation> for webhook::Operation {
    fn from(op: WireOperation) -> Self {
        match op {
            WireOperation::Create => webhook::Operation::Create,
            WireOperation::Update => webhook::Operation::Update,
            WireOperation::Delete => webhook::Operation::Delete,
        }
    }
}

pub struct AdmissionServer {
    addr: SocketAddr,
    tls: TlsConfig,
    config: Arc<AdmissionConfig>,
}

impl AdmissionServer {
    pub fn new(addr: SocketAddr, tls: TlsConfig, config: AdmissionConfig) -> Self {
        Self {
            addr,
            tls,
            config: Arc::new(config),
        }
    }

    /// Serves admission requests until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let acceptor = self.tls.build_acceptor()?;
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "admission server listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("admission server shutting down");
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
                    let acceptor = acceptor.clone();
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        let tls_stream = match acceptor.accept(stream).await {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(%peer, error = %e, "tls handshake failed");
                                return;
                            }
                        };
                        let io = TokioIo::new(tls_stream);
                        let service = service_fn(move |req| {
                            let config = config.clone();
                            async move { Ok::<_, std::convert::Infallible>(route(req, config).await) }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            warn!(%peer, error = %e, "connection error");
                        }
                    });
                }
            }
        }
    }
}

#[instrument(skip_all, fields(path = %req.uri().path()))]
async fn route(req: HttpRequest<Incoming>, config: Arc<AdmissionConfig>) -> HttpResponse<Full<Bytes>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok"),
        (&Method::POST, "/mutate") | (&Method::POST, "/validate") => handle_admission(req, &config).await,
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn handle_admission(req: HttpRequest<Incoming>, config: &AdmissionConfig) -> HttpResponse<Full<Bytes>> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return text_response(StatusCode::BAD_REQUEST, &format!("reading body: {e}")),
    };

    let wire: WireRequest = match serde_json::from_slice(&body) {
        Ok(w) => w,
        Err(e) => return text_response(StatusCode::BAD_REQUEST, &format!("decoding request: {e}")),
    };

    let admission_req = AdmissionRequest {
        uid: wire.uid,
        operation: wire.operation.into(),
        object: wire.object,
        old_object: wire.old_object,
    };

    match webhook::handle(admission_req, config) {
        Ok(resp) => json_response(StatusCode::OK, &resp),
        Err(AdmissionError::UnknownKind(kind)) => text_response(StatusCode::BAD_REQUEST, &format!("unknown kind: {kind}")),
        Err(e) => {
            error!(error = %e, "admission handling failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> HttpResponse<Full<Bytes>> {
    HttpResponse::builder()
        .status(status)
        .body(Full::new(Bytes::copy_from_slice(body.as_bytes())))
        .expect("static response is always well-formed")
}

fn json_response(status: StatusCode, value: &impl serde::Serialize) -> HttpResponse<Full<Bytes>> {
    let body = serde_json::to_vec(value).expect("admission response always serializes");
    HttpResponse::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response is always well-formed")
}
