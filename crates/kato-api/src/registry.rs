// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The injected dependency bundle.
//!
//! One registry constructed at startup and handed to every handler.
//! Nothing in the gateway reaches for a global: the store, the queue,
//! the runtime client, the caches, and the engines all live here.

use std::sync::Arc;

use kato_mq::TaskPublisher;
use kato_mq::kv::EphemeralKv;
use kato_runtime::StatusClient;
use kato_store::repo::Store;

use crate::admin::TenantAdmin;
use crate::auth::TokenCache;
use crate::auth::dispatch::{CertDispatcher, TokenDispatcher};
use crate::auth::license::{AcceptAllLicenses, LicenseVerifier};
use crate::config::Config;
use crate::events::EventLedger;
use crate::ingress::IngressEngine;
use crate::operations::Orchestrator;
use crate::plugins::PluginEngine;

/// Everything a handler needs, constructed once and injected.
pub struct Registry {
    /// Gateway configuration.
    pub config: Config,
    /// The persistence contract.
    pub store: Arc<dyn Store>,
    /// The task queue.
    pub publisher: Arc<dyn TaskPublisher>,
    /// The ephemeral keyspace.
    pub kv: EphemeralKv,
    /// The runtime status client.
    pub runtime: StatusClient,
    /// Token cache and authorization.
    pub token_cache: Arc<TokenCache>,
    /// The event ledger.
    pub ledger: EventLedger,
    /// Component operation orchestrator.
    pub orchestrator: Orchestrator,
    /// Gateway rule engine.
    pub ingress: IngressEngine,
    /// Plugin attachment engine.
    pub plugins: PluginEngine,
    /// Tenant and catalog administration.
    pub admin: TenantAdmin,
    /// Token issuance.
    pub token_dispatcher: TokenDispatcher,
    /// Certificate issuance; absent when no region CA is configured.
    pub cert_dispatcher: Option<CertDispatcher>,
    /// License verification seam.
    pub license: Arc<dyn LicenseVerifier>,
}

impl Registry {
    /// Wire the registry from its leaf dependencies.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        publisher: Arc<dyn TaskPublisher>,
        kv: EphemeralKv,
        runtime: StatusClient,
        cert_dispatcher: Option<CertDispatcher>,
    ) -> Self {
        let ledger = EventLedger::new(store.clone());
        let token_cache = Arc::new(TokenCache::new(store.clone()));
        let orchestrator = Orchestrator::new(
            store.clone(),
            publisher.clone(),
            ledger.clone(),
            config.enable_windows_builder,
        );
        let ingress = IngressEngine::new(store.clone(), publisher.clone());
        let plugins = PluginEngine::new(store.clone(), publisher.clone());
        let admin = TenantAdmin::new(store.clone(), publisher.clone(), ledger.clone());
        let token_dispatcher = TokenDispatcher::new(
            store.clone(),
            token_cache.clone(),
            config.region_name.clone(),
        );

        Self {
            config,
            store,
            publisher,
            kv,
            runtime,
            token_cache,
            ledger,
            orchestrator,
            ingress,
            plugins,
            admin,
            token_dispatcher,
            cert_dispatcher,
            license: Arc::new(AcceptAllLicenses),
        }
    }
}
