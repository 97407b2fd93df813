//! Path normalization and prefix matching.
//!
//! # Responsibilities
//! - Normalize paths and prefixes to a single canonical form
//! - Match a path prefix on a segment boundary (case-sensitive)
//!
//! # Design Decisions
//! - Normalization is idempotent so it can be applied at any layer
//! - `/api` matches `/api` and `/api/...` but never `/apiary`
//! - No regex to guarantee O(n) matching

/// Canonical form of a path or prefix.
///
/// - empty → `/`
/// - leading `/` added when missing
/// - trailing slashes removed unless the result is the root `/`
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Matches a normalized path against a normalized prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. The prefix is normalized.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize(prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_root(&self) -> bool {
        self.prefix == "/"
    }

    /// Returns the part of `path` after the prefix if it matches on a
    /// segment boundary. `path` must already be normalized.
    ///
    /// The remainder is either empty or starts with `/`. The root prefix
    /// matches every path and returns the path unchanged.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.is_root() {
            return Some(path);
        }
        let remainder = path.strip_prefix(self.prefix.as_str())?;
        if remainder.is_empty() || remainder.starts_with('/') {
            Some(remainder)
        } else {
            None
        }
    }

    /// Returns true if `path` (normalized) falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }
}
