//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from config
//! - Provide the per-request transaction sink used by the dispatcher
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured levels
//! - The transaction log has its own level (`transaction_log_level`)
//! - JSON format for log shippers, text for terminals
//! - Transaction records go to their own target (`gateway::http`) so they
//!   can be filtered or routed apart from application logs

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Target of the one-line-per-request transaction log.
pub const TRANSACTION_TARGET: &str = "gateway::http";

/// Initialize the global subscriber. Call once, before anything logs.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(config).into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    let level = &config.log_level;
    let mut directives = format!("api_gateway={level},gateway={level},tower_http={level}");
    if let Some(transactions) = &config.transaction_log_level {
        // The more specific target wins over `gateway=`.
        directives.push_str(&format!(",{TRANSACTION_TARGET}={transactions}"));
    }
    directives
}

/// One finished inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction<'a> {
    pub method: &'a str,
    /// Normalized request path.
    pub path: &'a str,
    pub status: u16,
    pub user_agent: &'a str,
}

/// Receives exactly one record per dispatched request.
///
/// Implementations must not block; the call sits on the request path.
pub trait TransactionSink: Send + Sync {
    fn log_transaction(&self, transaction: &Transaction<'_>);
}

/// Default sink: one `info` event per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TransactionSink for TracingSink {
    fn log_transaction(&self, t: &Transaction<'_>) {
        tracing::info!(
            target: TRANSACTION_TARGET,
            method = t.method,
            path = t.path,
            status = t.status,
            user_agent = t.user_agent,
            "HTTP Request"
        );
    }
}
