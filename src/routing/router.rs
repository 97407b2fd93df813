//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Validate raw routes (non-empty, http/https target, unique prefix,
//!   known auth type)
//! - Store normalized routes ordered longest prefix first
//! - Resolve a request path to a backend URL, or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Prefixes are unique after normalization, so sorting by length alone
//!   is deterministic for matching purposes

use url::Url;

use crate::auth::AuthRegistry;
use crate::config::{ConfigError, RouteConfig};
use crate::routing::matcher::{normalize, PathPrefixMatcher};

/// A validated, normalized route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    matcher: PathPrefixMatcher,
    /// Target base URL without trailing slash.
    target: String,
    /// Lowercased auth type, if the route requires authentication.
    auth: Option<String>,
}

impl Route {
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.auth.as_deref()
    }
}

/// Where a request path is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Backend URL for the path, without query string.
    pub target: String,
    /// Auth type the route requires.
    pub auth_type: Option<&'a str>,
    /// Matched prefix.
    pub prefix: &'a str,
}

/// Immutable set of routes, longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Validate and compile raw routes.
    ///
    /// `registry` must already hold every strategy the routes reference.
    pub fn build(raw: &[RouteConfig], registry: &AuthRegistry) -> Result<Self, ConfigError> {
        let mut routes: Vec<Route> = Vec::with_capacity(raw.len());

        for config in raw {
            let route = compile_route(config, registry)?;
            if routes.iter().any(|r| r.prefix() == route.prefix()) {
                return Err(ConfigError::DuplicatePrefix {
                    prefix: route.prefix().to_string(),
                });
            }
            routes.push(route);
        }

        // Stable: equal lengths keep config order.
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));

        for route in &routes {
            tracing::debug!(
                prefix = %route.prefix(),
                target = %route.target,
                auth = route.auth.as_deref().unwrap_or("none"),
                "Route compiled"
            );
        }

        Ok(Self { routes })
    }

    /// Resolve `path` to its backend URL.
    ///
    /// The path is normalized first. The first (longest) prefix matching on
    /// a segment boundary wins. For the root prefix the whole path is
    /// appended to the target, otherwise only the part after the prefix.
    pub fn resolve(&self, path: &str) -> Option<Resolution<'_>> {
        let path = normalize(path);
        self.routes.iter().find_map(|route| {
            let remainder = route.matcher.strip(&path)?;
            Some(Resolution {
                target: format!("{}{}", route.target, remainder),
                auth_type: route.auth_type(),
                prefix: route.prefix(),
            })
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn compile_route(config: &RouteConfig, registry: &AuthRegistry) -> Result<Route, ConfigError> {
    if config.prefix.is_empty() || config.target.is_empty() {
        return Err(ConfigError::InvalidRoute {
            prefix: config.prefix.clone(),
            target: config.target.clone(),
        });
    }

    let target = normalize_target(&config.target)?;
    let matcher = PathPrefixMatcher::new(&config.prefix);

    let auth = match config.auth.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(auth) => {
            if !registry.contains(auth) {
                return Err(ConfigError::UnknownAuthType {
                    prefix: matcher.prefix().to_string(),
                    auth: auth.to_string(),
                });
            }
            Some(auth.to_ascii_lowercase())
        }
    };

    Ok(Route {
        matcher,
        target,
        auth,
    })
}

/// Check scheme and shape of a target and strip its trailing slashes.
fn normalize_target(target: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    let lower = target.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(ConfigError::InvalidScheme {
            target: target.to_string(),
        });
    }

    let url = Url::parse(target).map_err(|e| invalid(&e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }

    let path = normalize(url.path());
    let base = &url[..url::Position::BeforePath];
    if path == "/" {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}{path}"))
    }
}
