//! Response status capture.
//!
//! # Responsibilities
//! - Record the status actually sent to the client, whether the backend
//!   produced it or the gateway synthesized it (404/401/502)
//!
//! # Design Decisions
//! - First write wins, like an HTTP response head: later writes are ignored
//! - Atomic so the recorder can be shared by reference across awaits

use std::sync::atomic::{AtomicU16, Ordering};

use axum::http::StatusCode;
use axum::response::Response;

const UNSET: u16 = 0;

/// Observes the first response head written for a request.
#[derive(Debug, Default)]
pub struct StatusRecorder {
    status: AtomicU16,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` unless a status was already written.
    ///
    /// Returns the status that stands.
    pub fn write_head(&self, status: StatusCode) -> StatusCode {
        match self.status.compare_exchange(
            UNSET,
            status.as_u16(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => status,
            Err(existing) => StatusCode::from_u16(existing).unwrap_or(status),
        }
    }

    /// Record the status of `response` and hand it back unchanged.
    pub fn observe(&self, response: Response) -> Response {
        self.write_head(response.status());
        response
    }

    /// The recorded status, if anything was written.
    pub fn status(&self) -> Option<StatusCode> {
        match self.status.load(Ordering::Acquire) {
            UNSET => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }
}
