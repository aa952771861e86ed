// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for the gateway schema.
//!
//! Migrations are embedded at compile time and applied on startup.
//! Safe to call multiple times; already-applied migrations are skipped.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};

/// All gateway migrations, embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run all migrations against the given pool.
pub async fn run(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
