// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ephemeral keyspace.
//!
//! Holds short-lived state the gateway exchanges with workers and the
//! data plane outside the relational store: declared net-rule snapshots
//! per component downstream, and service-check results keyed by check
//! uuid. Key shapes are part of the worker contract and must not change.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::Result;

/// Key for a net-rule snapshot of one downstream destination.
pub fn net_rule_key(tenant_id: &str, service_alias: &str, dest_service: &str, port: i32) -> String {
    format!("netRules/{tenant_id}/{service_alias}/downstream/{dest_service}/{port}")
}

/// Key for a service-check result.
pub fn service_check_key(check_uuid: &str) -> String {
    format!("servicecheck/{check_uuid}")
}

/// Ephemeral key/value store over the shared queue connection.
#[derive(Clone)]
pub struct EphemeralKv {
    conn: ConnectionManager,
}

impl EphemeralKv {
    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Store a value with a time-to-live in seconds.
    pub async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    /// Store a value without expiry.
    pub async fn put_forever(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.set(key, value).await?;
        Ok(())
    }

    /// Fetch a value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Remove a value.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(
            net_rule_key("t1", "gr123456", "grabcdef", 5000),
            "netRules/t1/gr123456/downstream/grabcdef/5000"
        );
        assert_eq!(
            service_check_key("11f5e1a2"),
            "servicecheck/11f5e1a2"
        );
    }
}
