//! The authenticated caller attached to a request (§4.K).
//!
//! A `Principal` is derived by the auth layer and never persisted by the
//! core; every other component references it by value for the lifetime of
//! one request.

use std::collections::HashSet;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Opaque user identifier.
    pub user_id: String,
    /// Tenant this caller belongs to.
    pub tenant_id: String,
    /// Role names granted to this caller.
    pub roles: HashSet<String>,
    /// Fine-grained permissions, e.g. `"models:read"`, `"models:*"`, `"*"`.
    pub permissions: HashSet<String>,
    /// The API key id used to authenticate, if credential-based.
    pub api_key_id: Option<String>,
}

impl Principal {
    /// Construct a principal with no roles or permissions.
    #[must_use]
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            roles: HashSet::new(),
            permissions: HashSet::new(),
            api_key_id: None,
        }
    }

    /// Whether this principal has `permission`, matching exactly or via a
    /// wildcard: `"segment:*"` matches any permission sharing the `segment`
    /// prefix, and the bare `"*"` matches anything.
    #[must_use]
    pub fn has(&self, permission: &str) -> bool {
        has_permission(&self.permissions, permission)
    }
}

/// Standalone permission check, usable without constructing a `Principal`
/// (e.g. for testing the matching rule itself).
#[must_use]
pub fn has_permission(granted: &HashSet<String>, requested: &str) -> bool {
    if granted.contains("*") || granted.contains(requested) {
        return true;
    }

    let Some((requested_prefix, _)) = requested.split_once(':') else {
        return false;
    };

    granted.iter().any(|g| {
        g.split_once(':')
            .is_some_and(|(prefix, suffix)| suffix == "*" && prefix == requested_prefix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        let granted = set(&["models:read"]);
        assert!(has_permission(&granted, "models:read"));
        assert!(!has_permission(&granted, "models:write"));
    }

    #[test]
    fn test_segment_wildcard() {
        let granted = set(&["models:*"]);
        assert!(has_permission(&granted, "models:read"));
        assert!(has_permission(&granted, "models:write"));
        assert!(!has_permission(&granted, "tenants:read"));
    }

    #[test]
    fn test_global_wildcard() {
        let granted = set(&["*"]);
        assert!(has_permission(&granted, "anything:at:all"));
    }

    #[test]
    fn test_no_match() {
        let granted = set(&["models:read"]);
        assert!(!has_permission(&granted, "tenants:read"));
    }
}
