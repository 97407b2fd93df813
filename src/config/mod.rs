//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → loader.rs (locate, parse & deserialize, env overrides)
//!     → GatewayConfig (raw, syntactically valid)
//!     → http::dispatch::RoutingState::from_config (semantic checks:
//!       auth registry first, then the route table against it)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require building a new
//!   routing state
//! - All fields have defaults to allow minimal configs
//! - Serde handles syntax; route/auth semantics are checked where the
//!   runtime structures are built, so an invalid table can never exist

pub mod loader;
pub mod schema;

pub use loader::{load_config, locate_config, ConfigError, DEFAULT_CONFIG_FILE};
pub use schema::{
    AuthConfig, ClaimsConfig, GatewayConfig, JwtAlgorithm, JwtAuthConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, RouteConfig, TimeoutConfig,
};
