//! HTTP API gateway library.
//!
//! Routes requests by longest path prefix, authenticates them with a
//! pluggable strategy and forwards them to backend services.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use http::{GatewayHandler, HttpServer, RoutingState};
pub use lifecycle::Shutdown;
