//! Tenant entity and registry (§3 "Tenant").
//!
//! Mirrors `gateway-providers::registry`'s shape: a `DashMap`-backed catalog
//! behind a small typed API, rather than exposing the map directly.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use thiserror::Error;

/// A tenant and its settings, seeded from `gateway-config` or registered at
/// runtime.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// Tenant id, unique within the registry.
    pub id: String,
    /// Billing/feature plan name.
    pub plan: String,
    /// Free-form settings (rate limit overrides, feature flags, ...).
    pub settings: HashMap<String, String>,
    /// When this tenant was registered.
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Construct a new tenant on the default plan with no settings.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plan: "default".to_string(),
            settings: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Errors from tenant registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// A tenant with this id is already registered.
    #[error("tenant '{0}' already registered")]
    AlreadyExists(String),
    /// No tenant with this id exists.
    #[error("tenant '{0}' not found")]
    NotFound(String),
    /// A user with this email is already registered under this tenant.
    #[error("email already registered for tenant '{tenant_id}'")]
    DuplicateEmail {
        /// The tenant the duplicate was attempted against.
        tenant_id: String,
    },
}

/// The tenant catalog, plus the `(tenantId, email)` uniqueness invariant
/// over each tenant's users.
pub struct TenantRegistry {
    tenants: DashMap<String, Tenant>,
    /// `(tenant_id, email)` -> user id, enforcing the uniqueness invariant.
    emails: DashMap<(String, String), String>,
}

impl Default for TenantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            emails: DashMap::new(),
        }
    }

    /// Register a new tenant. Fails if the id is already taken.
    pub fn register(&self, tenant: Tenant) -> Result<(), TenantError> {
        if self.tenants.contains_key(&tenant.id) {
            return Err(TenantError::AlreadyExists(tenant.id));
        }
        self.tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    /// Look up a tenant by id.
    #[must_use]
    pub fn get(&self, tenant_id: &str) -> Option<Tenant> {
        self.tenants.get(tenant_id).map(|t| t.clone())
    }

    /// Number of registered tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether the registry has no tenants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Register a user's email under a tenant, enforcing the
    /// `(tenantId, email)` uniqueness invariant. Fails if the tenant does not
    /// exist or the email is already taken within that tenant.
    pub fn register_user_email(
        &self,
        tenant_id: &str,
        user_id: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<(), TenantError> {
        if !self.tenants.contains_key(tenant_id) {
            return Err(TenantError::NotFound(tenant_id.to_string()));
        }
        let key = (tenant_id.to_string(), email.into());
        match self.emails.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TenantError::DuplicateEmail {
                tenant_id: tenant_id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user_id.into());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = TenantRegistry::new();
        registry.register(Tenant::new("acme")).unwrap();
        assert!(registry.get("acme").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_duplicate_tenant_rejected() {
        let registry = TenantRegistry::new();
        registry.register(Tenant::new("acme")).unwrap();
        let err = registry.register(Tenant::new("acme")).unwrap_err();
        assert_eq!(err, TenantError::AlreadyExists("acme".to_string()));
    }

    #[test]
    fn test_email_uniqueness_within_tenant() {
        let registry = TenantRegistry::new();
        registry.register(Tenant::new("acme")).unwrap();
        registry
            .register_user_email("acme", "user-1", "a@acme.test")
            .unwrap();
        let err = registry
            .register_user_email("acme", "user-2", "a@acme.test")
            .unwrap_err();
        assert_eq!(
            err,
            TenantError::DuplicateEmail {
                tenant_id: "acme".to_string()
            }
        );
    }

    #[test]
    fn test_same_email_allowed_across_tenants() {
        let registry = TenantRegistry::new();
        registry.register(Tenant::new("acme")).unwrap();
        registry.register(Tenant::new("globex")).unwrap();
        registry
            .register_user_email("acme", "user-1", "a@shared.test")
            .unwrap();
        registry
            .register_user_email("globex", "user-2", "a@shared.test")
            .unwrap();
    }

    #[test]
    fn test_unknown_tenant_rejected() {
        let registry = TenantRegistry::new();
        let err = registry
            .register_user_email("ghost", "user-1", "a@ghost.test")
            .unwrap_err();
        assert_eq!(err, TenantError::NotFound("ghost".to_string()));
    }
}
