//! # Director Proxy
//!
//! Local HTTP proxy forwarding every request to the Director with the agent's
//! client certificate attached.
//!
//! The backend is hot-swapped by [`Proxy::update_cert_and_url`] whenever the
//! certificate is rotated. Until the first successful update every request is
//! answered with `503 Service Unavailable`.
//!
//! Readers clone the current backend out of the lock; no I/O happens while
//! the lock is held.

pub mod certificates;

use crate::constants::{PROXY_MAX_BODY_BYTES, PROXY_NOT_CONFIGURED_BODY};
use crate::error::AppError;
use crate::observability::metrics;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub use certificates::{CertificateRefresher, CertificateSource, ClientCertificate, KubeCertificateSource};

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug)]
struct Backend {
    url: reqwest::Url,
    client: reqwest::Client,
}

#[derive(Debug, Default)]
pub struct Proxy {
    insecure_skip_verify: bool,
    backend: RwLock<Option<Arc<Backend>>>,
}

impl Proxy {
    #[must_use]
    pub fn new(insecure_skip_verify: bool) -> Self {
        Self {
            insecure_skip_verify,
            backend: RwLock::new(None),
        }
    }

    /// Replace the backend with one targeting `url` and presenting
    /// `certificate`. On error the previous backend stays active.
    pub fn update_cert_and_url(&self, certificate: &ClientCertificate, url: &str) -> Result<(), AppError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::wrong_input(format!("invalid Director URL {url}: {e}")))?;
        let identity = reqwest::Identity::from_pem(&certificate.to_pem())
            .map_err(|e| AppError::wrong_input(format!("invalid client certificate: {e}")))?;
        let client = reqwest::Client::builder()
            .identity(identity)
            .danger_accept_invalid_certs(self.insecure_skip_verify)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build proxy client: {e}")))?;

        self.swap(url, client);
        Ok(())
    }

    fn swap(&self, url: reqwest::Url, client: reqwest::Client) {
        info!("Director proxy now targets {url}");
        let backend = Arc::new(Backend { url, client });
        // A poisoned lock only means a writer panicked; the slot is still valid
        *self.backend.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(backend);
    }

    fn current(&self) -> Option<Arc<Backend>> {
        self.backend
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.current().is_some()
    }

    /// Router answering every path and method
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .fallback(forward)
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Serve on `127.0.0.1:port` until `shutdown` resolves, then drain
    /// in-flight requests.
    pub async fn serve<F>(self: Arc<Self>, port: u16, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr).await?;
        info!("Director proxy listening on {addr}");

        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_on<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Director proxy stopped");
        Ok(())
    }
}

async fn forward(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    let response = match proxy.current() {
        None => (StatusCode::SERVICE_UNAVAILABLE, PROXY_NOT_CONFIGURED_BODY).into_response(),
        Some(backend) => match send(&backend, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to forward request to Director: {e}");
                (StatusCode::BAD_GATEWAY, e).into_response()
            }
        },
    };

    metrics::increment_proxy_requests(response.status().as_u16());
    response
}

async fn send(backend: &Backend, request: Request) -> Result<Response, String> {
    let (parts, body) = request.into_parts();
    let target = target_url(&backend.url, &parts.uri);
    debug!("Forwarding {} {target}", parts.method);

    let body = axum::body::to_bytes(body, PROXY_MAX_BODY_BYTES)
        .await
        .map_err(|e| format!("Failed to read request body: {e}"))?;

    let upstream = backend
        .client
        .request(parts.method, target)
        .headers(forwarded_headers(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| format!("Director request failed: {e}"))?;

    let status = upstream.status();
    let headers = forwarded_headers(upstream.headers());
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| format!("Failed to read Director response: {e}"))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Backend URL with the incoming path and query appended
fn target_url(base: &reqwest::Url, uri: &axum::http::Uri) -> String {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{}{path_and_query}", base.as_str().trim_end_matches('/'))
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP_HEADERS {
        forwarded.remove(*name);
    }
    forwarded.remove(header::CONTENT_LENGTH);
    forwarded
}
