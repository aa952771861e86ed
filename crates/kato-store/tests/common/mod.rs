// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for kato-store integration tests.
//!
//! Tests run against a real PostgreSQL only when `TEST_DATABASE_URL`
//! is set; otherwise they no-op.

#![allow(dead_code)]

use sqlx::PgPool;
use uuid::Uuid;

use kato_store::PostgresStore;

/// Test context holding a migrated store.
pub struct TestContext {
    pub pool: PgPool,
    pub store: PostgresStore,
}

impl TestContext {
    /// Connect and migrate. None when no test database is configured.
    pub async fn new() -> Option<Self> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&database_url).await.ok()?;
        kato_store::migrations::run(&pool).await.ok()?;
        Some(Self {
            store: PostgresStore::new(pool.clone()),
            pool,
        })
    }

    /// A unique id for test rows so runs never collide.
    pub fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4().simple())
    }
}
