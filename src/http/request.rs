//! Outbound request preparation.
//!
//! # Responsibilities
//! - Carry the resolved target and auth requirement through the pipeline
//! - Write verified identity headers
//! - Rewrite URI and Host for the backend, add X-Forwarded-* headers
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - Identity headers overwrite caller-supplied values of the same name
//! - X-Forwarded-For is appended to; without a peer address it is removed
//! - The inbound method, path and user agent are captured for logging
//!   before any of this runs

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::uri::{InvalidUri, Uri};

use crate::auth::{DenyReason, Identity};

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Request-scoped routing decision, passed explicitly between stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Backend URL for the request path, without query.
    pub target: String,
    /// Auth type the matched route requires.
    pub auth_type: Option<String>,
}

impl RequestContext {
    /// Absolute outbound URI: target plus the inbound query string.
    pub fn outbound_uri(&self, query: Option<&str>) -> Result<Uri, InvalidUri> {
        match query {
            Some(query) => format!("{}?{}", self.target, query).parse(),
            None => self.target.parse(),
        }
    }
}

/// Overwrite `X-User-Id` and `X-User-Role` with the verified identity.
///
/// Claim values that cannot be carried in a header deny the request.
pub fn inject_identity(headers: &mut HeaderMap, identity: &Identity) -> Result<(), DenyReason> {
    let user_id = HeaderValue::from_str(&identity.user_id)
        .map_err(|_| DenyReason::MalformedClaim("user id".into()))?;
    let roles = HeaderValue::from_str(&identity.joined_roles())
        .map_err(|_| DenyReason::MalformedClaim("roles".into()))?;

    headers.insert(X_USER_ID, user_id);
    headers.insert(X_USER_ROLE, roles);
    Ok(())
}

/// Point the request at the backend.
pub fn rewrite(
    parts: &mut Parts,
    context: &RequestContext,
    client: Option<IpAddr>,
) -> Result<(), InvalidUri> {
    let uri = context.outbound_uri(parts.uri.query())?;
    let inbound_host = parts.headers.get(header::HOST).cloned();

    strip_hop_by_hop(&mut parts.headers);
    set_forwarded(&mut parts.headers, client, inbound_host);

    match uri
        .authority()
        .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    {
        Some(host) => {
            parts.headers.insert(header::HOST, host);
        }
        None => {
            parts.headers.remove(header::HOST);
        }
    }
    parts.uri = uri;
    Ok(())
}

fn set_forwarded(headers: &mut HeaderMap, client: Option<IpAddr>, inbound_host: Option<HeaderValue>) {
    match client {
        Some(ip) => {
            // Prior entries are copied as raw bytes, valid UTF-8 or not.
            let mut chain = Vec::new();
            for prior in headers.get_all(&X_FORWARDED_FOR) {
                chain.extend_from_slice(prior.as_bytes());
                chain.extend_from_slice(b", ");
            }
            chain.extend_from_slice(ip.to_string().as_bytes());
            // Built only from valid header values and an IP literal.
            if let Ok(value) = HeaderValue::from_bytes(&chain) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }
        // Without a peer address the inbound chain cannot be extended.
        None => {
            headers.remove(X_FORWARDED_FOR);
        }
    }

    match inbound_host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host);
        }
        None => {
            headers.remove(X_FORWARDED_HOST);
        }
    }
    // TLS is terminated in front of the gateway, if at all.
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove connection-scoped headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
