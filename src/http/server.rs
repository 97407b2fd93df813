//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health endpoint and the gateway fallback
//! - Wire up middleware (tracing, request ID)
//! - Give each dispatch a cancellation token bound to the backend
//!   timeout, the client connection and the shutdown deadline
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::dispatch::GatewayHandler;
use crate::http::forward::{ReqwestTransport, Transport};
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
pub struct AppState<T = ReqwestTransport> {
    pub handler: Arc<GatewayHandler<T>>,
    /// Parent of every per-request token; cancelled at the drain deadline.
    pub requests: CancellationToken,
    pub backend_timeout: Duration,
}

// Manual impl: deriving would require `T: Clone`.
impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            requests: self.requests.clone(),
            backend_timeout: self.backend_timeout,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server around a ready handler.
    pub fn new<T>(config: GatewayConfig, handler: Arc<GatewayHandler<T>>, shutdown: &Shutdown) -> Self
    where
        T: Transport + 'static,
    {
        let state = AppState {
            handler,
            requests: shutdown.request_token(),
            backend_timeout: Duration::from_secs(config.timeouts.backend_secs),
        };
        let router = build_router(state);
        Self { router, config }
    }

    /// The assembled router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` is triggered and connections drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router<T>(state: AppState<T>) -> Router
where
    T: Transport + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .fallback(gateway_handler::<T>)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Hands every non-health request to the dispatcher.
async fn gateway_handler<T>(State(state): State<AppState<T>>, request: axum::extract::Request) -> Response
where
    T: Transport + 'static,
{
    let cancel = state.requests.child_token();
    // Axum drops this future when the client goes away. Dispatch runs in
    // its own task so it outlives the drop, sees the cancellation and
    // still writes its transaction record.
    let _disconnect = cancel.clone().drop_guard();

    let deadline = cancel.clone();
    let timeout = state.backend_timeout;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => deadline.cancel(),
            _ = deadline.cancelled() => {}
        }
    });

    let handler = state.handler.clone();
    let dispatch = tokio::spawn(async move { handler.dispatch(request, cancel).await });
    match dispatch.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::dispatch::RoutingState;
    use crate::http::forward::TransportFuture;
    use crate::observability::{Transaction, TracingSink, TransactionSink};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StatusSink {
        statuses: Mutex<Vec<u16>>,
    }

    impl TransactionSink for StatusSink {
        fn log_transaction(&self, t: &Transaction<'_>) {
            self.statuses.lock().unwrap().push(t.status);
        }
    }

    struct NeverCalled;

    impl Transport for NeverCalled {
        fn send(&self, _request: Request<Body>) -> TransportFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    fn router(timeout: Duration) -> Router {
        router_with_sink(timeout, Arc::new(TracingSink))
    }

    fn router_with_sink(timeout: Duration, sink: Arc<dyn TransactionSink>) -> Router {
        let mut config = GatewayConfig::default();
        config.routes = vec![crate::config::RouteConfig::new("/api", "http://127.0.0.1:9")];
        let state = RoutingState::from_config(&config).unwrap();
        let handler = Arc::new(GatewayHandler::new(state, NeverCalled, sink));
        build_router(AppState {
            handler,
            requests: CancellationToken::new(),
            backend_timeout: timeout,
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = router(Duration::from_secs(5))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = router(Duration::from_secs(5))
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_backend_timeout_cancels_dispatch() {
        let response = router(Duration::from_millis(50))
            .oneshot(Request::builder().uri("/api/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_dropped_request_is_still_logged() {
        let sink = Arc::new(StatusSink::default());
        let app = router_with_sink(Duration::from_secs(30), sink.clone());

        // Dropping the in-flight future is what the server does when the
        // client disconnects.
        let in_flight = app.oneshot(Request::builder().uri("/api/slow").body(Body::empty()).unwrap());
        assert!(tokio::time::timeout(Duration::from_millis(100), in_flight)
            .await
            .is_err());

        for _ in 0..50 {
            if !sink.statuses.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sink.statuses.lock().unwrap().as_slice(), [502]);
    }
}
