//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use api_gateway::config::GatewayConfig;
use api_gateway::http::{GatewayHandler, HttpServer, ReqwestTransport, RoutingState};
use api_gateway::lifecycle::Shutdown;
use api_gateway::observability::{Transaction, TracingSink, TransactionSink};

/// Start a backend that echoes the request line and headers as JSON,
/// answering with `status`.
pub async fn start_echo_backend(status: StatusCode) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(move |request: Request| async move {
        let headers: Map<String, Value> = request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Value::String(value.to_str().unwrap_or_default().to_string()),
                )
            })
            .collect();
        let body = json!({
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "query": request.uri().query(),
            "headers": headers,
        });
        (status, Json(body)).into_response()
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that accepts requests but answers after `delay`.
#[allow(dead_code)]
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "late"
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Sets its flag when dropped before `disarm` is called.
struct AbortFlag(Option<Arc<AtomicBool>>);

impl AbortFlag {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbortFlag {
    fn drop(&mut self) {
        if let Some(flag) = self.0.take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Like `start_slow_backend`, but the returned flag turns true when a
/// request is abandoned before its answer is ready.
#[allow(dead_code)]
pub async fn start_abort_tracking_backend(delay: Duration) -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let aborted = Arc::new(AtomicBool::new(false));

    let flag = aborted.clone();
    let app = axum::Router::new().fallback(move || {
        let guard = AbortFlag(Some(flag.clone()));
        async move {
            tokio::time::sleep(delay).await;
            guard.disarm();
            "late"
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, aborted)
}

/// Keeps every transaction the gateway logs.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<(String, String, u16)>>,
}

impl TransactionSink for RecordingSink {
    fn log_transaction(&self, t: &Transaction<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((t.method.to_string(), t.path.to_string(), t.status));
    }
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running gateway bound to an ephemeral port.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handler: Arc<GatewayHandler>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build the routing state from `config` and serve it.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    start_gateway_with_sink(config, Arc::new(TracingSink)).await
}

/// Same as `start_gateway`, logging transactions to `sink`.
pub async fn start_gateway_with_sink(
    config: GatewayConfig,
    sink: Arc<dyn TransactionSink>,
) -> TestGateway {
    let state = RoutingState::from_config(&config).unwrap();
    let transport = ReqwestTransport::new(&config).unwrap();
    let handler = Arc::new(GatewayHandler::new(state, transport, sink));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, handler.clone(), &shutdown);
    tokio::spawn(server.run(listener, shutdown.clone()));

    TestGateway {
        addr,
        shutdown,
        handler,
    }
}

/// Client that, like the gateway, ignores proxies and redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
