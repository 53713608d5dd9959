//! Quota enforcement (§4.J): atomic check-and-increment token buckets keyed
//! by `(tenant, kind)`, with the window rolling forward once `now >=
//! reset_at` rather than being reset by a separate timer task.

use dashmap::DashMap;
use gateway_core::GatewayError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A quota's configured limit and window, seeded from
/// `gateway-config::schema::QuotaSeed`.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimit {
    /// Requests (or tokens, or cost units) permitted per window.
    pub limit: u64,
    /// Window length.
    pub window: Duration,
}

/// A point-in-time view of one tenant/kind quota bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaSnapshot {
    /// Units consumed so far in the current window.
    pub used: u64,
    /// Configured limit for the window.
    pub limit: u64,
    /// Milliseconds until the window resets.
    pub resets_in_ms: u64,
}

struct Bucket {
    limit: QuotaLimit,
    used: u64,
    reset_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Per-`(tenant, kind)` quota buckets.
pub struct QuotaRegistry {
    buckets: DashMap<(String, String), Bucket>,
}

impl Default for QuotaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaRegistry {
    /// An empty registry; tenants/kinds with no seeded limit are treated as
    /// unlimited by [`Self::check_and_consume`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Seed (or replace) the limit for a `(tenant, kind)` pair. Does not
    /// reset already-consumed usage unless no bucket existed yet.
    pub fn seed(&self, tenant_id: impl Into<String>, kind: impl Into<String>, limit: QuotaLimit) {
        let key = (tenant_id.into(), kind.into());
        self.buckets
            .entry(key)
            .and_modify(|b| b.limit = limit)
            .or_insert_with(|| Bucket {
                limit,
                used: 0,
                reset_at_ms: now_ms() + limit.window.as_millis() as u64,
            });
    }

    /// Atomically check and, if admitted, consume `cost` units from the
    /// tenant's `kind` quota. A tenant/kind with no seeded limit is
    /// unrestricted. Rolls the window forward (resetting `used` to zero)
    /// once the reset time has passed, before checking the limit.
    ///
    /// # Errors
    /// Returns `GatewayError::QuotaExceeded` with a `retry_after` hint equal
    /// to the time remaining in the current window.
    pub fn check_and_consume(
        &self,
        tenant_id: &str,
        kind: &str,
        cost: u64,
    ) -> Result<QuotaSnapshot, GatewayError> {
        let key = (tenant_id.to_string(), kind.to_string());
        let Some(mut entry) = self.buckets.get_mut(&key) else {
            return Ok(QuotaSnapshot {
                used: 0,
                limit: u64::MAX,
                resets_in_ms: 0,
            });
        };

        let now = now_ms();
        if now >= entry.reset_at_ms {
            entry.used = 0;
            entry.reset_at_ms = now + entry.limit.window.as_millis() as u64;
        }

        if entry.used + cost > entry.limit.limit {
            let retry_after = Duration::from_millis(entry.reset_at_ms.saturating_sub(now));
            return Err(GatewayError::quota_exceeded(
                format!("quota '{kind}' exceeded for tenant '{tenant_id}'"),
                Some(retry_after),
            ));
        }

        entry.used += cost;
        Ok(QuotaSnapshot {
            used: entry.used,
            limit: entry.limit.limit,
            resets_in_ms: entry.reset_at_ms.saturating_sub(now),
        })
    }

    /// Current snapshot for a `(tenant, kind)` pair without consuming any
    /// quota, if one has been seeded.
    #[must_use]
    pub fn snapshot(&self, tenant_id: &str, kind: &str) -> Option<QuotaSnapshot> {
        let key = (tenant_id.to_string(), kind.to_string());
        self.buckets.get(&key).map(|entry| QuotaSnapshot {
            used: entry.used,
            limit: entry.limit.limit,
            resets_in_ms: entry.reset_at_ms.saturating_sub(now_ms()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseeded_quota_is_unlimited() {
        let registry = QuotaRegistry::new();
        let snap = registry.check_and_consume("acme", "requests", 1_000_000).unwrap();
        assert_eq!(snap.limit, u64::MAX);
    }

    #[test]
    fn test_admits_within_limit_and_rejects_over() {
        let registry = QuotaRegistry::new();
        registry.seed(
            "acme",
            "requests",
            QuotaLimit {
                limit: 2,
                window: Duration::from_secs(60),
            },
        );
        registry.check_and_consume("acme", "requests", 1).unwrap();
        registry.check_and_consume("acme", "requests", 1).unwrap();
        let err = registry.check_and_consume("acme", "requests", 1).unwrap_err();
        assert!(matches!(err, GatewayError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_window_rolls_forward() {
        let registry = QuotaRegistry::new();
        registry.seed(
            "acme",
            "requests",
            QuotaLimit {
                limit: 1,
                window: Duration::from_millis(0),
            },
        );
        registry.check_and_consume("acme", "requests", 1).unwrap();
        // window already expired (0ms), so the next check rolls forward
        let snap = registry.check_and_consume("acme", "requests", 1).unwrap();
        assert_eq!(snap.used, 1);
    }
}
