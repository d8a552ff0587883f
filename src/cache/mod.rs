//! Bounded in-memory cache for list responses.
//!
//! Time-boxed entries with capacity-bounded insertion and prefix-based
//! invalidation on writes. Process-local only; correctness never depends on
//! a hit.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::role::UserRole;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
    pub fn instance() -> &'static ResponseCache {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<ResponseCache> = OnceLock::new();
        INSTANCE.get_or_init(ResponseCache::new)
    }

    fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn ttl() -> Duration {
        Duration::from_secs(crate::config::config().cache.ttl_secs)
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if !crate::config::config().cache.enabled {
            return None;
        }
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > Self::ttl() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) {
        let config = &crate::config::config().cache;
        if !config.enabled {
            return;
        }
        let mut entries = self.entries.write().await;

        if entries.len() >= config.max_entries {
            Self::evict(&mut entries, config.max_entries);
        }

        entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every key starting with `prefix`; called by write paths with
    /// the resource name so stale lists disappear immediately.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Expired entries first; if still at capacity, the oldest entry goes
    fn evict(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) {
        let ttl = Self::ttl();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);

        while entries.len() >= max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => entries.remove(&key),
                None => break,
            };
        }
    }
}

/// Cache key for a list endpoint: resource, caller identity (scope is
/// role-derived, so identity is part of the key), and the query params.
pub fn list_key<P: Serialize>(
    resource: &str,
    user_id: Uuid,
    role: UserRole,
    params: &P,
) -> String {
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{}:{}:{}:{}", resource, user_id, role.as_str(), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        tokio::time::pause();
        let cache = ResponseCache::new();
        cache.put("audits:k", json!({"data": []})).await;
        assert!(cache.get("audits:k").await.is_some());

        tokio::time::advance(Duration::from_secs(
            crate::config::config().cache.ttl_secs + 1,
        ))
        .await;
        assert!(cache.get("audits:k").await.is_none());
    }

    #[tokio::test]
    async fn prefix_invalidation_only_hits_the_resource() {
        let cache = ResponseCache::new();
        cache.put("audits:a", json!(1)).await;
        cache.put("audits:b", json!(2)).await;
        cache.put("documents:a", json!(3)).await;

        cache.invalidate_prefix("audits").await;
        assert!(cache.get("audits:a").await.is_none());
        assert!(cache.get("audits:b").await.is_none());
        assert!(cache.get("documents:a").await.is_some());
    }

    #[tokio::test]
    async fn capacity_bound_evicts_oldest() {
        tokio::time::pause();
        let cache = ResponseCache::new();
        let max = crate::config::config().cache.max_entries;

        for i in 0..max {
            cache.put(format!("audits:{}", i), json!(i)).await;
            // Distinct insertion instants so eviction order is well defined
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        cache.put("audits:newest", json!("n")).await;

        let entries = cache.entries.read().await;
        assert!(entries.len() <= max);
        assert!(entries.contains_key("audits:newest"));
        assert!(!entries.contains_key("audits:0"));
    }

    #[test]
    fn key_includes_identity_and_params() {
        let id = Uuid::new_v4();
        let key = list_key("audits", id, UserRole::WajibPajak, &json!({"page": 2}));
        assert!(key.starts_with("audits:"));
        assert!(key.contains(&id.to_string()));
        assert!(key.contains("wajib_pajak"));
    }
}
