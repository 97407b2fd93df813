//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → matcher.rs (normalize; segment-boundary prefix test)
//!     → router.rs (scan routes longest prefix first)
//!     → Return: Resolution { target URL, auth type } or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + AuthRegistry
//!     → Validate (non-empty, scheme, unique prefix, known auth type)
//!     → Normalize prefixes and targets
//!     → Sort by prefix length, longest first
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (longest prefix by construction order)

pub mod matcher;
pub mod router;

pub use matcher::{normalize, PathPrefixMatcher};
pub use router::{Resolution, Route, RouteTable};
