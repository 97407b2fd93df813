//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Prefix routes mapping request paths to backend targets.
    pub routes: Vec<RouteConfig>,

    /// Authentication strategies referenced by routes.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound for a buffered request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A single prefix route as written in the config file.
///
/// Missing fields deserialize as empty strings so that route validation,
/// not the parser, reports them.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// URL path prefix.
    #[serde(default)]
    pub prefix: String,

    /// Base URL of the backend (http or https).
    #[serde(default)]
    pub target: String,

    /// Auth type identifier; absent means the route is public.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl RouteConfig {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            target: target.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }
}

/// Authentication section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT strategy; registered under the `jwt` auth type when present.
    #[serde(rename = "jwt-auth", skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtAuthConfig>,
}

/// JWT strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JwtAuthConfig {
    /// Symmetric signing key.
    #[serde(default)]
    pub secret: String,

    /// Header carrying the bearer token.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// HMAC algorithm the tokens are signed with.
    #[serde(default)]
    pub algorithm: JwtAlgorithm,

    /// Expected `iss` claim, validated only when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Expected `aud` claim, validated only when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Clock skew allowance for `exp`/`nbf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leeway_secs: Option<u64>,

    /// Which claims hold the identity.
    #[serde(default)]
    pub claims: ClaimsConfig,
}

impl JwtAuthConfig {
    /// Config with default header, algorithm and claim names.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            auth_header: default_auth_header(),
            algorithm: JwtAlgorithm::default(),
            issuer: None,
            audience: None,
            leeway_secs: None,
            claims: ClaimsConfig::default(),
        }
    }
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

/// Supported HMAC algorithms.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

/// Names of the claims carrying user id and roles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClaimsConfig {
    pub user_id: String,
    pub role: String,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            user_id: "sub".to_string(),
            role: "role".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for one forwarded request, in seconds.
    pub backend_secs: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            backend_secs: 30,
            shutdown_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Text for terminals, JSON for log shippers.
    pub log_format: LogFormat,

    /// Level for the per-request transaction log; `log_level` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_log_level: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            transaction_log_level: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
