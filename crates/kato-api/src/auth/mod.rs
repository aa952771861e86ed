// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bearer-token authorization.
//!
//! Tokens are validated dual-read: the in-memory map first, the
//! repository on a miss (caching the hit). Expired tokens fail closed.
//! An `all_power` token passes everywhere; any other scope class grants
//! exactly the URI prefixes mapped to it. Cache writes happen at init
//! and on explicit rotation only.

pub mod dispatch;
pub mod license;

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use kato_store::repo::{AuthStore, Store};
use kato_store::types::{ApiClassRecord, RegionUserInfoRecord};

use crate::error::Result;

/// Scope class that passes every URI.
pub const ALL_POWER: &str = "all_power";

/// Scope class granted to ordinary region consoles.
pub const SERVER_SOURCE: &str = "server_source";

/// Scope class granted to node managers.
pub const NODE_MANAGER: &str = "node_manager";

/// Validity stamped on the bootstrap token: far enough that it never
/// expires in practice.
const BOOTSTRAP_VALIDITY_SECS: i64 = 100 * 365 * 24 * 3600;

/// True when `prefix` is a proper prefix of `uri`.
fn scope_matches(prefix: &str, uri: &str) -> bool {
    uri.len() > prefix.len() && uri.starts_with(prefix)
}

/// The token cache.
pub struct TokenCache {
    store: Arc<dyn Store>,
    tokens: DashMap<String, RegionUserInfoRecord>,
    classes: DashMap<String, Vec<ApiClassRecord>>,
}

impl TokenCache {
    /// Create a cache over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            tokens: DashMap::new(),
            classes: DashMap::new(),
        }
    }

    /// Seed the bootstrap token from the environment with all-power
    /// scope and a far-future validity.
    pub fn seed_bootstrap(&self, token: &str) {
        self.tokens.insert(
            token.to_string(),
            RegionUserInfoRecord {
                eid: "bootstrap".to_string(),
                token: token.to_string(),
                api_range: ALL_POWER.to_string(),
                ca: None,
                key: None,
                validity_period: Utc::now().timestamp() + BOOTSTRAP_VALIDITY_SECS,
            },
        );
    }

    /// Preload every non-expired token from the repository.
    pub async fn init_token_map(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let records = self.store.list_valid_tokens(now).await?;
        let count = records.len();
        for record in records {
            self.tokens.insert(record.token.clone(), record);
        }
        info!(count, "Token map initialized");
        Ok(count)
    }

    /// Insert (or replace) a token in the cache.
    pub fn insert(&self, record: RegionUserInfoRecord) {
        self.tokens.insert(record.token.clone(), record);
    }

    /// Evict a token from the cache.
    pub fn evict(&self, token: &str) {
        self.tokens.remove(token);
    }

    /// Prefixes of a scope class, cached after the first repository read.
    async fn classes_for(&self, class_level: &str) -> Result<Vec<ApiClassRecord>> {
        if let Some(cached) = self.classes.get(class_level) {
            return Ok(cached.clone());
        }
        let classes = self.store.list_api_classes(class_level).await?;
        self.classes
            .insert(class_level.to_string(), classes.clone());
        Ok(classes)
    }

    /// Validate a bearer token against a URI.
    pub async fn check_token(&self, token: &str, uri: &str) -> Result<bool> {
        // Dual read: memory first, repository on miss. The map guard
        // is dropped before any await.
        let cached = self.tokens.get(token).map(|r| r.clone());
        let record = match cached {
            Some(record) => record,
            None => match self.store.get_token(token).await? {
                Some(record) => {
                    self.tokens.insert(token.to_string(), record.clone());
                    record
                }
                None => {
                    debug!("Unknown token rejected");
                    return Ok(false);
                }
            },
        };

        // Expired tokens fail closed; drop the stale cache entry so
        // the next attempt re-reads the repository.
        if record.validity_period < Utc::now().timestamp() {
            self.tokens.remove(token);
            debug!(eid = %record.eid, "Expired token rejected");
            return Ok(false);
        }

        if record.api_range == ALL_POWER {
            return Ok(true);
        }

        let classes = self.classes_for(&record.api_range).await?;
        Ok(classes.iter().any(|c| scope_matches(&c.prefix, uri)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kato_store::memory::MemoryStore;
    use kato_store::repo::AuthStore;

    fn token_record(token: &str, api_range: &str, validity_period: i64) -> RegionUserInfoRecord {
        RegionUserInfoRecord {
            eid: format!("eid-{token}"),
            token: token.to_string(),
            api_range: api_range.to_string(),
            ca: None,
            key: None,
            validity_period,
        }
    }

    async fn cache_with_classes() -> (TokenCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for prefix in ["/v2/show", "/v2/tenants", "/v2/gateway"] {
            store.insert_api_class(SERVER_SOURCE, prefix).await.unwrap();
        }
        for prefix in ["/v2/nodes", "/v2/job", "/v2/configs"] {
            store.insert_api_class(NODE_MANAGER, prefix).await.unwrap();
        }
        (TokenCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_scope_prefix_matching() {
        let (cache, store) = cache_with_classes().await;
        let in_an_hour = Utc::now().timestamp() + 3600;
        store
            .save_token(&token_record("T", SERVER_SOURCE, in_an_hour))
            .await
            .unwrap();

        // Prefix match admits; a node-manager path does not.
        assert!(cache.check_token("T", "/v2/show/x").await.unwrap());
        assert!(!cache.check_token("T", "/v2/nodes").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_token_fails_closed() {
        let (cache, store) = cache_with_classes().await;
        let an_hour_ago = Utc::now().timestamp() - 3600;
        store
            .save_token(&token_record("T", SERVER_SOURCE, an_hour_ago))
            .await
            .unwrap();

        assert!(!cache.check_token("T", "/v2/show/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_all_power_passes_everywhere() {
        let (cache, store) = cache_with_classes().await;
        let in_an_hour = Utc::now().timestamp() + 3600;
        store
            .save_token(&token_record("T", ALL_POWER, in_an_hour))
            .await
            .unwrap();

        assert!(cache.check_token("T", "/v2/nodes").await.unwrap());
        assert!(cache.check_token("T", "/cloud/auth").await.unwrap());
    }

    #[tokio::test]
    async fn test_dual_read_caches_repository_hit() {
        let (cache, store) = cache_with_classes().await;
        let in_an_hour = Utc::now().timestamp() + 3600;
        store
            .save_token(&token_record("T", SERVER_SOURCE, in_an_hour))
            .await
            .unwrap();

        assert!(cache.check_token("T", "/v2/show/x").await.unwrap());
        // A briefly-stale cached token keeps working after the row is
        // replaced; rotation evicts explicitly.
        assert!(cache.tokens.contains_key("T"));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (cache, _store) = cache_with_classes().await;
        assert!(!cache.check_token("nope", "/v2/show/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_seed() {
        let (cache, _store) = cache_with_classes().await;
        cache.seed_bootstrap("defaulttokentoken");
        assert!(cache.check_token("defaulttokentoken", "/v2/anything").await.unwrap());
    }

    #[test]
    fn test_proper_prefix() {
        assert!(scope_matches("/v2/show", "/v2/show/x"));
        assert!(!scope_matches("/v2/show", "/v2/show"));
        assert!(!scope_matches("/v2/show", "/v2/sh"));
    }
}
