//! Per-request dispatch pipeline.
//!
//! # State Machine
//! ```text
//! RECEIVED → RouteTable::resolve
//!     no match                      → NOT_FOUND (404)
//!     match, public route           → ROUTED
//!     match, auth type set          → registry lookup + authenticate
//!         no strategy               → INTERNAL_ERROR (500)
//!         denied                    → AUTH_DENIED (401)
//!         authenticated             → ROUTED (identity headers written)
//! ROUTED → rewrite (URI, Host, X-Forwarded-*) → FORWARDED
//! FORWARDED → backend answers       → RESPONDED (backend status)
//!           → failure / cancelled   → UPSTREAM_ERROR (502)
//! ```
//!
//! Every path ends in exactly one transaction record.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthOutcome, AuthRegistry, DenyReason};
use crate::config::{ConfigError, GatewayConfig, RouteConfig};
use crate::http::forward::{ForwardError, ReqwestTransport, Transport};
use crate::http::request::{inject_identity, rewrite, RequestContext};
use crate::http::response::StatusRecorder;
use crate::observability::metrics;
use crate::observability::{Transaction, TransactionSink};
use crate::routing::{normalize, RouteTable};

/// Route table together with the registry it was validated against.
#[derive(Debug, Clone)]
pub struct RoutingState {
    table: RouteTable,
    registry: AuthRegistry,
}

impl RoutingState {
    /// Build the table against an already populated registry.
    pub fn new(routes: &[RouteConfig], registry: AuthRegistry) -> Result<Self, ConfigError> {
        let table = RouteTable::build(routes, &registry)?;
        Ok(Self { table, registry })
    }

    /// Registry first, then routes, from a loaded config.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let registry = AuthRegistry::from_config(&config.auth)?;
        Self::new(&config.routes, registry)
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn registry(&self) -> &AuthRegistry {
        &self.registry
    }
}

/// Per-request failures, each mapped to one response status.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches the request path")]
    RouteNotFound,

    #[error("authentication denied: {0}")]
    AuthDenied(DenyReason),

    #[error("no strategy registered for auth type {0:?}")]
    MissingStrategy(String),

    #[error("resolved target is not a valid URI: {0}")]
    InvalidTarget(String),

    #[error("{0}")]
    RequestBody(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Upstream(String),

    #[error("request cancelled before the backend answered")]
    Cancelled,
}

impl DispatchError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::RouteNotFound => "route_not_found",
            Self::AuthDenied(_) => "auth_denied",
            Self::MissingStrategy(_) => "missing_strategy",
            Self::InvalidTarget(_) => "invalid_target",
            Self::RequestBody(_) => "request_body",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Upstream(_) => "upstream_error",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::AuthDenied(_) => StatusCode::UNAUTHORIZED,
            Self::MissingStrategy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidTarget(_) | Self::Upstream(_) | Self::Cancelled => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ForwardError> for DispatchError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::RequestBody(_) => Self::RequestBody(err.to_string()),
            ForwardError::PayloadTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            ForwardError::InvalidUrl { .. } => Self::InvalidTarget(err.to_string()),
            ForwardError::Upstream(_) => Self::Upstream(err.to_string()),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Only the canonical reason goes out; details stay in the logs.
        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

/// Routes, authenticates and forwards inbound requests.
pub struct GatewayHandler<T = ReqwestTransport> {
    state: ArcSwap<RoutingState>,
    transport: T,
    sink: Arc<dyn TransactionSink>,
}

impl<T: Transport> GatewayHandler<T> {
    pub fn new(state: RoutingState, transport: T, sink: Arc<dyn TransactionSink>) -> Self {
        Self {
            state: ArcSwap::from_pointee(state),
            transport,
            sink,
        }
    }

    /// Current routing snapshot.
    pub fn state(&self) -> Arc<RoutingState> {
        self.state.load_full()
    }

    /// Swap in a new table and registry. Requests already running keep
    /// the snapshot they started with.
    pub fn replace(&self, state: RoutingState) {
        tracing::info!(routes = state.table.len(), "Routing state replaced");
        self.state.store(Arc::new(state));
    }

    /// Handle one request end to end.
    ///
    /// `cancel` aborts the backend call; timeouts and client disconnects
    /// are imposed through it by the caller.
    pub async fn dispatch(&self, request: Request<Body>, cancel: CancellationToken) -> Response {
        let started = Instant::now();
        let recorder = StatusRecorder::new();

        let method = request.method().clone();
        let path = normalize(request.uri().path());
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let (response, outcome) = match self.forward(request, &path, &recorder, &cancel).await {
            Ok(response) => (response, "responded"),
            Err(err) => {
                report(&err, method.as_str(), &path);
                let outcome = err.error_type();
                (recorder.observe(err.into_response()), outcome)
            }
        };

        let status = recorder.status().unwrap_or_else(|| response.status());
        self.sink.log_transaction(&Transaction {
            method: method.as_str(),
            path: &path,
            status: status.as_u16(),
            user_agent: &user_agent,
        });
        metrics::record_request(method.as_str(), status.as_u16(), outcome, started);

        response
    }

    async fn forward(
        &self,
        request: Request<Body>,
        path: &str,
        recorder: &StatusRecorder,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        let state = self.state.load_full();

        let resolution = state.table.resolve(path).ok_or(DispatchError::RouteNotFound)?;
        let context = RequestContext {
            target: resolution.target,
            auth_type: resolution.auth_type.map(str::to_owned),
        };

        let identity = match &context.auth_type {
            None => None,
            Some(auth_type) => {
                let strategy = state
                    .registry
                    .lookup(auth_type)
                    .ok_or_else(|| DispatchError::MissingStrategy(auth_type.clone()))?;
                match strategy.authenticate(&request) {
                    AuthOutcome::Authenticated(identity) => Some(identity),
                    AuthOutcome::Denied(reason) => return Err(DispatchError::AuthDenied(reason)),
                }
            }
        };

        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let (mut parts, body) = request.into_parts();

        if let Some(identity) = &identity {
            inject_identity(&mut parts.headers, identity).map_err(DispatchError::AuthDenied)?;
            tracing::debug!(user_id = %identity.user_id, path, "Request authenticated");
        }
        rewrite(&mut parts, &context, client)
            .map_err(|e| DispatchError::InvalidTarget(format!("{}: {e}", context.target)))?;

        tracing::debug!(path, target = %parts.uri, "Forwarding request");
        let outbound = Request::from_parts(parts, body);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            result = self.transport.send(outbound) => result?,
        };

        recorder.write_head(response.status());
        Ok(response)
    }
}

fn report(err: &DispatchError, method: &str, path: &str) {
    let error_type = err.error_type();
    match err {
        DispatchError::RouteNotFound => {
            tracing::debug!(method, path, "No route matched");
        }
        DispatchError::AuthDenied(reason) => {
            tracing::warn!(method, path, reason = %reason, "Authentication denied");
        }
        DispatchError::Cancelled => {
            tracing::warn!(method, path, error_type, "Request cancelled");
        }
        DispatchError::RequestBody(_) | DispatchError::PayloadTooLarge(_) => {
            tracing::warn!(method, path, error_type, error = %err, "Rejected request body");
        }
        DispatchError::MissingStrategy(_) => {
            tracing::error!(method, path, error = %err, "Route references an unregistered strategy");
        }
        _ => {
            tracing::error!(method, path, error_type, error = %err, "Upstream error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtAuthConfig;
    use crate::http::forward::TransportFuture;
    use crate::http::request::{X_USER_ID, X_USER_ROLE};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::Mutex;

    const SECRET: &str = "dispatch-test-secret";

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(String, String, u16, String)>>,
    }

    impl TransactionSink for RecordingSink {
        fn log_transaction(&self, t: &Transaction<'_>) {
            self.records.lock().unwrap().push((
                t.method.to_string(),
                t.path.to_string(),
                t.status,
                t.user_agent.to_string(),
            ));
        }
    }

    /// Answers with a fixed status and remembers what it was sent.
    struct StubTransport {
        status: StatusCode,
        seen: Mutex<Vec<Request<()>>>,
    }

    impl StubTransport {
        fn answering(status: StatusCode) -> Self {
            Self {
                status,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: Request<Body>) -> TransportFuture<'_> {
            let (parts, _) = request.into_parts();
            self.seen.lock().unwrap().push(Request::from_parts(parts, ()));
            let status = self.status;
            Box::pin(async move {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = status;
                Ok(response)
            })
        }
    }

    /// Never answers.
    struct HangingTransport;

    impl Transport for HangingTransport {
        fn send(&self, _request: Request<Body>) -> TransportFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    fn state() -> RoutingState {
        let mut config = GatewayConfig::default();
        config.auth.jwt = Some(JwtAuthConfig::new(SECRET));
        config.routes = vec![
            RouteConfig::new("/api", "http://api-backend"),
            RouteConfig::new("/api/test", "http://backend"),
            RouteConfig::new("/secure", "http://secure-backend").with_auth("JWT"),
        ];
        RoutingState::from_config(&config).unwrap()
    }

    fn handler<T: Transport>(transport: T) -> (GatewayHandler<T>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (GatewayHandler::new(state(), transport, sink.clone()), sink)
    }

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn get(uri: &str) -> axum::http::request::Builder {
        Request::builder().uri(uri).header(header::USER_AGENT, "test-agent")
    }

    #[tokio::test]
    async fn test_forwards_with_suffix_and_query() {
        let (handler, sink) = handler(StubTransport::answering(StatusCode::ACCEPTED));

        let request = get("/api/test/42?x=1").body(Body::empty()).unwrap();
        let response = handler.dispatch(request, CancellationToken::new()).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let seen = handler.transport.seen.lock().unwrap();
        assert_eq!(seen[0].uri(), "http://backend/42?x=1");
        assert_eq!(seen[0].headers()[header::HOST], "backend");
        assert!(!seen[0].headers().contains_key(X_USER_ID));

        let records = sink.records.lock().unwrap();
        assert_eq!(
            records.as_slice(),
            [(
                "GET".to_string(),
                "/api/test/42".to_string(),
                202,
                "test-agent".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404_without_backend_call() {
        let (handler, sink) = handler(StubTransport::answering(StatusCode::OK));

        let request = get("/unknown/").body(Body::empty()).unwrap();
        let response = handler.dispatch(request, CancellationToken::new()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(handler.transport.seen.lock().unwrap().is_empty());
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, "/unknown");
        assert_eq!(records[0].2, 404);
    }

    #[tokio::test]
    async fn test_valid_token_injects_identity() {
        let (handler, _) = handler(StubTransport::answering(StatusCode::OK));
        let token = token(json!({"sub": "u1", "role": ["ADMIN", "USER"]}));

        let request = get("/secure/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(X_USER_ID, "spoofed")
            .body(Body::empty())
            .unwrap();
        let response = handler.dispatch(request, CancellationToken::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = handler.transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers()[X_USER_ID], "u1");
        assert_eq!(seen[0].headers()[X_USER_ROLE], "ADMIN,USER");
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_backend() {
        let (handler, sink) = handler(StubTransport::answering(StatusCode::OK));
        let forged = encode(
            &Header::default(),
            &json!({"sub": "u1", "role": ["ADMIN"]}),
            &EncodingKey::from_secret(b"another-key"),
        )
        .unwrap();

        for auth in [None, Some(forged)] {
            let mut builder = get("/secure/me");
            if let Some(auth) = auth {
                builder = builder.header(header::AUTHORIZATION, auth);
            }
            let response = handler
                .dispatch(builder.body(Body::empty()).unwrap(), CancellationToken::new())
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], b"Unauthorized");
        }

        assert!(handler.transport.seen.lock().unwrap().is_empty());
        let statuses: Vec<u16> = sink.records.lock().unwrap().iter().map(|r| r.2).collect();
        assert_eq!(statuses, [401, 401]);
    }

    #[tokio::test]
    async fn test_missing_role_claim_denied() {
        let (handler, _) = handler(StubTransport::answering(StatusCode::OK));
        let token = token(json!({"sub": "u1"}));

        let request = get("/secure")
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();
        let response = handler.dispatch(request, CancellationToken::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cancellation_yields_502() {
        let (handler, sink) = handler(HangingTransport);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = get("/api/slow").body(Body::empty()).unwrap();
        let response = handler.dispatch(request, cancel).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(sink.records.lock().unwrap()[0].2, 502);
    }

    #[tokio::test]
    async fn test_replace_swaps_routes() {
        let (handler, _) = handler(StubTransport::answering(StatusCode::OK));
        let replacement = RoutingState::new(
            &[RouteConfig::new("/v2", "http://v2")],
            AuthRegistry::new(),
        )
        .unwrap();
        handler.replace(replacement);

        let old = handler
            .dispatch(get("/api/x").body(Body::empty()).unwrap(), CancellationToken::new())
            .await;
        assert_eq!(old.status(), StatusCode::NOT_FOUND);

        let new = handler
            .dispatch(get("/v2/x").body(Body::empty()).unwrap(), CancellationToken::new())
            .await;
        assert_eq!(new.status(), StatusCode::OK);
        assert_eq!(handler.transport.seen.lock().unwrap()[0].uri(), "http://v2/x");
    }

    /// Reads the body the way the real transport does.
    struct BufferingTransport;

    impl Transport for BufferingTransport {
        fn send(&self, request: Request<Body>) -> TransportFuture<'_> {
            Box::pin(async move {
                crate::http::forward::read_body(request.into_body(), 8).await?;
                Ok::<_, ForwardError>(Response::new(Body::empty()))
            })
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let (handler, sink) = handler(BufferingTransport);

        let request = get("/api/upload").body(Body::from("0123456789abcdef")).unwrap();
        let response = handler.dispatch(request, CancellationToken::new()).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(sink.records.lock().unwrap()[0].2, 413);
    }

    #[test]
    fn test_unregistered_auth_type_fails_construction() {
        let err = RoutingState::new(
            &[RouteConfig::new("/x", "http://x").with_auth("jwt")],
            AuthRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAuthType { .. }));
    }
}
