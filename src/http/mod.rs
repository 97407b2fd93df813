//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, per-request cancellation)
//!     → dispatch.rs (resolve route, authenticate)
//!     → request.rs (identity headers, URI/Host rewrite, X-Forwarded-*)
//!     → forward.rs (send to backend)
//!     → response.rs (capture status for the transaction log)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{DispatchError, GatewayHandler, RoutingState};
pub use forward::{ForwardError, ReqwestTransport, Transport, TransportFuture};
pub use request::{RequestContext, X_USER_ID, X_USER_ROLE};
pub use response::StatusRecorder;
pub use server::{build_router, AppState, HttpServer};
