// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway rule queries: HTTP/TCP rules, certificates, rule configs,
//! and the sync-plan application.

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Transaction};

use super::PostgresStore;
use crate::error::{Result, map_unique};
use crate::repo::GatewayStore;
use crate::types::{
    CertificateRecord, GatewaySyncPlan, HttpRuleRecord, RuleConfigRecord, TcpRuleRecord,
};

const HTTP_RULE_COLUMNS: &str =
    "uuid, service_id, container_port, domain, path, header, cookie, weight, ip, certificate_id";

const TCP_RULE_COLUMNS: &str = "uuid, service_id, container_port, ip, port";

/// Insert a certificate unless one with the same id already exists.
async fn ensure_certificate(conn: &mut PgConnection, cert: &CertificateRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO certificates (uuid, certificate_name, certificate, private_key, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (uuid) DO NOTHING
        "#,
    )
    .bind(&cert.uuid)
    .bind(&cert.certificate_name)
    .bind(&cert.certificate)
    .bind(&cert.private_key)
    .bind(cert.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Upsert an HTTP rule by uuid.
async fn upsert_http_rule(conn: &mut PgConnection, rule: &HttpRuleRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO http_rules (uuid, service_id, container_port, domain, path, header,
                                cookie, weight, ip, certificate_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (uuid) DO UPDATE
        SET service_id = EXCLUDED.service_id,
            container_port = EXCLUDED.container_port,
            domain = EXCLUDED.domain,
            path = EXCLUDED.path,
            header = EXCLUDED.header,
            cookie = EXCLUDED.cookie,
            weight = EXCLUDED.weight,
            ip = EXCLUDED.ip,
            certificate_id = EXCLUDED.certificate_id
        "#,
    )
    .bind(&rule.uuid)
    .bind(&rule.service_id)
    .bind(rule.container_port)
    .bind(&rule.domain)
    .bind(&rule.path)
    .bind(&rule.header)
    .bind(&rule.cookie)
    .bind(rule.weight)
    .bind(&rule.ip)
    .bind(&rule.certificate_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Replace every config row of a rule with the given set.
async fn replace_rule_configs(
    tx: &mut Transaction<'_, Postgres>,
    rule_id: &str,
    configs: &[RuleConfigRecord],
) -> Result<()> {
    sqlx::query("DELETE FROM gw_rule_configs WHERE rule_id = $1")
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;
    for cfg in configs {
        sqlx::query(
            "INSERT INTO gw_rule_configs (rule_id, cfg_key, cfg_value) VALUES ($1, $2, $3)",
        )
        .bind(rule_id)
        .bind(&cfg.key)
        .bind(&cfg.value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl GatewayStore for PostgresStore {
    async fn add_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: &[RuleConfigRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if let Some(cert) = certificate {
            ensure_certificate(&mut tx, cert).await?;
        }
        sqlx::query(
            r#"
            INSERT INTO http_rules (uuid, service_id, container_port, domain, path, header,
                                    cookie, weight, ip, certificate_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&rule.uuid)
        .bind(&rule.service_id)
        .bind(rule.container_port)
        .bind(&rule.domain)
        .bind(&rule.path)
        .bind(&rule.header)
        .bind(&rule.cookie)
        .bind(rule.weight)
        .bind(&rule.ip)
        .bind(&rule.certificate_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "http rule"))?;
        replace_rule_configs(&mut tx, &rule.uuid, configs).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: Option<&[RuleConfigRecord]>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if let Some(cert) = certificate {
            ensure_certificate(&mut tx, cert).await?;
        }
        upsert_http_rule(&mut tx, rule).await?;
        if let Some(configs) = configs {
            replace_rule_configs(&mut tx, &rule.uuid, configs).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_http_rule(&self, uuid: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM gw_rule_configs WHERE rule_id = $1")
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM http_rules WHERE uuid = $1")
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_http_rule(&self, uuid: &str) -> Result<Option<HttpRuleRecord>> {
        let row = sqlx::query_as::<_, HttpRuleRecord>(&format!(
            "SELECT {HTTP_RULE_COLUMNS} FROM http_rules WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_http_rules(&self, service_id: &str) -> Result<Vec<HttpRuleRecord>> {
        let rows = sqlx::query_as::<_, HttpRuleRecord>(&format!(
            "SELECT {HTTP_RULE_COLUMNS} FROM http_rules WHERE service_id = $1"
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_certificate(&self, uuid: &str) -> Result<Option<CertificateRecord>> {
        let row = sqlx::query_as::<_, CertificateRecord>(
            "SELECT uuid, certificate_name, certificate, private_key, created_at \
             FROM certificates WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn add_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tcp_rules (uuid, service_id, container_port, ip, port) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&rule.uuid)
        .bind(&rule.service_id)
        .bind(rule.container_port)
        .bind(&rule.ip)
        .bind(rule.port)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "tcp rule"))?;
        Ok(())
    }

    async fn update_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()> {
        sqlx::query(
            "UPDATE tcp_rules SET service_id = $2, container_port = $3, ip = $4, port = $5 \
             WHERE uuid = $1",
        )
        .bind(&rule.uuid)
        .bind(&rule.service_id)
        .bind(rule.container_port)
        .bind(&rule.ip)
        .bind(rule.port)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "tcp rule"))?;
        Ok(())
    }

    async fn delete_tcp_rule(&self, uuid: &str) -> Result<()> {
        sqlx::query("DELETE FROM tcp_rules WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_tcp_rule(&self, uuid: &str) -> Result<Option<TcpRuleRecord>> {
        let row = sqlx::query_as::<_, TcpRuleRecord>(&format!(
            "SELECT {TCP_RULE_COLUMNS} FROM tcp_rules WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_tcp_rules(&self, service_id: &str) -> Result<Vec<TcpRuleRecord>> {
        let rows = sqlx::query_as::<_, TcpRuleRecord>(&format!(
            "SELECT {TCP_RULE_COLUMNS} FROM tcp_rules WHERE service_id = $1"
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn tcp_ports_for_ip(&self, ip: &str) -> Result<Vec<i32>> {
        // Rules bound to 0.0.0.0 occupy the port on every address.
        let rows = sqlx::query_scalar::<_, i32>(
            "SELECT port FROM tcp_rules WHERE ip = $1 OR ip = '0.0.0.0' OR $1 = '0.0.0.0'",
        )
        .bind(ip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn tcp_port_exists(&self, ip: &str, port: i32) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tcp_rules \
             WHERE port = $2 AND (ip = $1 OR ip = '0.0.0.0' OR $1 = '0.0.0.0')",
        )
        .bind(ip)
        .bind(port)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_rule_configs(&self, rule_id: &str) -> Result<Vec<RuleConfigRecord>> {
        let rows = sqlx::query_as::<_, RuleConfigRecord>(
            "SELECT rule_id, cfg_key, cfg_value FROM gw_rule_configs \
             WHERE rule_id = $1 ORDER BY cfg_key",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_sync(&self, plan: &GatewaySyncPlan) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Certificates first: rules reference them.
        for cert in &plan.ensure_certificates {
            ensure_certificate(&mut tx, cert).await?;
        }
        for (rule, configs) in &plan.upsert_http {
            upsert_http_rule(&mut tx, rule).await?;
            replace_rule_configs(&mut tx, &rule.uuid, configs).await?;
        }
        for rule in &plan.upsert_tcp {
            sqlx::query(
                r#"
                INSERT INTO tcp_rules (uuid, service_id, container_port, ip, port)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (uuid) DO UPDATE
                SET service_id = EXCLUDED.service_id,
                    container_port = EXCLUDED.container_port,
                    ip = EXCLUDED.ip,
                    port = EXCLUDED.port
                "#,
            )
            .bind(&rule.uuid)
            .bind(&rule.service_id)
            .bind(rule.container_port)
            .bind(&rule.ip)
            .bind(rule.port)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique(e, "tcp rule"))?;
        }

        // Deletions in dependency order: configs, rules, certificates.
        if !plan.delete_config_rule_ids.is_empty() {
            sqlx::query("DELETE FROM gw_rule_configs WHERE rule_id = ANY($1)")
                .bind(&plan.delete_config_rule_ids)
                .execute(&mut *tx)
                .await?;
        }
        if !plan.delete_http_rule_ids.is_empty() {
            sqlx::query("DELETE FROM http_rules WHERE uuid = ANY($1)")
                .bind(&plan.delete_http_rule_ids)
                .execute(&mut *tx)
                .await?;
        }
        if !plan.delete_tcp_rule_ids.is_empty() {
            sqlx::query("DELETE FROM tcp_rules WHERE uuid = ANY($1)")
                .bind(&plan.delete_tcp_rule_ids)
                .execute(&mut *tx)
                .await?;
        }
        if !plan.delete_certificate_ids.is_empty() {
            // Only prune certificates no rule references anymore.
            sqlx::query(
                r#"
                DELETE FROM certificates c
                WHERE c.uuid = ANY($1)
                  AND NOT EXISTS (SELECT 1 FROM http_rules r WHERE r.certificate_id = c.uuid)
                "#,
            )
            .bind(&plan.delete_certificate_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
