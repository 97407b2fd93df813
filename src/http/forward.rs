//! Backend forwarding transport.
//!
//! # Responsibilities
//! - Send a fully rewritten request to its absolute URI
//! - Return the backend response with its status and headers untouched,
//!   minus hop-by-hop headers
//!
//! # Design Decisions
//! - `Transport` is the seam between dispatch and the network so the
//!   pipeline can be exercised without sockets
//! - Redirects are passed to the client, never followed
//! - Environment proxy settings are ignored
//! - Request bodies are buffered (bounded); response bodies stream

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::LengthLimitError;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::request::strip_hop_by_hop;

/// Errors raised while talking to a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid outbound url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("backend request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response<Body>, ForwardError>> + Send + 'a>>;

/// Sends one outbound request. The request URI is absolute.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Body>) -> TransportFuture<'_>;
}

/// HTTP/HTTPS transport backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.listener.max_body_bytes,
        })
    }
}

/// Buffer a request body of at most `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<axum::body::Bytes, ForwardError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.downcast_ref::<LengthLimitError>().is_some() {
            ForwardError::PayloadTooLarge { limit }
        } else {
            ForwardError::RequestBody(inner.to_string())
        }
    })
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request<Body>) -> TransportFuture<'_> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();

            let url = parts.uri.to_string();
            let url = reqwest::Url::parse(&url).map_err(|e| ForwardError::InvalidUrl {
                url,
                reason: e.to_string(),
            })?;
            let body = read_body(body, self.max_body_bytes).await?;

            let upstream = self
                .client
                .request(parts.method, url)
                .headers(parts.headers)
                .body(body)
                .send()
                .await?;

            let status = upstream.status();
            let mut headers = upstream.headers().clone();
            strip_hop_by_hop(&mut headers);

            let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            Ok::<_, ForwardError>(response)
        })
    }
}
