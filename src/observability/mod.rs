//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (one call per request):
//!     → logging.rs (TransactionSink: method, path, status, user agent)
//!     → metrics.rs (counters, histograms)
//!
//! HTTP layer:
//!     → tower-http TraceLayer spans, x-request-id propagation
//!
//! Consumers:
//!     → Log aggregation (stdout, text or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The transaction sink is a value handed to the dispatcher, not a global
//! - Request ID flows to the backend and back to the client
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, TracingSink, Transaction, TransactionSink};
