//! Pluggable request authentication.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     AuthConfig → AuthRegistry::from_config → strategies keyed by auth type
//!     (must happen before the route table is built; routes reference it)
//!
//! Per request (route declares an auth type):
//!     registry.lookup(auth type) → strategy.authenticate(&request)
//!     → Authenticated(Identity) | Denied(DenyReason)
//! ```
//!
//! # Design Decisions
//! - Strategies only decide; the dispatcher writes identity headers
//! - Routes without an auth type never reach a strategy (there is no
//!   "none" strategy instance)
//! - Registry is read-only after startup and shared without locks

pub mod jwt;
pub mod registry;

use axum::body::Body;
use axum::http::Request;
use thiserror::Error;

pub use jwt::JwtStrategy;
pub use registry::AuthRegistry;

/// Identity extracted from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl Identity {
    /// Roles in the wire form used by `X-User-Role`.
    pub fn joined_roles(&self) -> String {
        self.roles.join(",")
    }
}

/// Why a request was refused. Logged, never sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("missing auth header")]
    MissingHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("claim {0:?} missing or empty")]
    MissingClaim(String),

    #[error("claim {0:?} has the wrong type")]
    MalformedClaim(String),
}

/// Result of running a strategy against a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Denied(DenyReason),
}

/// An authentication strategy a route can require by name.
pub trait AuthStrategy: Send + Sync + std::fmt::Debug {
    /// Auth type routes use to reference this strategy. Compared
    /// case-insensitively.
    fn identifier(&self) -> &str;

    /// Inspect the inbound request and decide.
    fn authenticate(&self, request: &Request<Body>) -> AuthOutcome;
}
