//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal returns
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → drain in-flight requests
//!     deadline passed → force → in-flight requests cancelled (502) → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in main: config, logging, routing state, listener
//! - Shutdown has timeout: forced cancellation after the drain deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
