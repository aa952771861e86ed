// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway reconciliation planning.
//!
//! Given the declared rules of a component snapshot and the rules
//! currently persisted for the same components, compute the plan that
//! makes the store match the snapshot: upsert everything declared,
//! delete what disappeared, and queue orphan-candidate certificates for
//! pruning. The plan is applied by the store in one transaction; the
//! guard against deleting a still-referenced certificate lives there.

use std::collections::HashSet;

use kato_store::types::{
    CertificateRecord, GatewaySyncPlan, HttpRuleRecord, RuleConfigRecord, TcpRuleRecord,
};

/// Desired rules of one component in a snapshot.
#[derive(Debug, Clone, Default)]
pub struct DesiredComponentRules {
    /// The component.
    pub service_id: String,
    /// Declared HTTP rules with their full config sets.
    pub http_rules: Vec<(HttpRuleRecord, Vec<RuleConfigRecord>)>,
    /// Declared TCP rules.
    pub tcp_rules: Vec<TcpRuleRecord>,
    /// Certificates the HTTP rules reference.
    pub certificates: Vec<CertificateRecord>,
}

/// Compute the reconciliation plan.
///
/// `current_http` / `current_tcp` must cover exactly the components in
/// `desired`; rules of components outside the snapshot are untouched.
pub fn compute_sync_plan(
    current_http: &[HttpRuleRecord],
    current_tcp: &[TcpRuleRecord],
    desired: &[DesiredComponentRules],
) -> GatewaySyncPlan {
    let mut plan = GatewaySyncPlan::default();

    let desired_http_ids: HashSet<&str> = desired
        .iter()
        .flat_map(|d| d.http_rules.iter().map(|(r, _)| r.uuid.as_str()))
        .collect();
    let desired_tcp_ids: HashSet<&str> = desired
        .iter()
        .flat_map(|d| d.tcp_rules.iter().map(|r| r.uuid.as_str()))
        .collect();

    for d in desired {
        for cert in &d.certificates {
            plan.ensure_certificates.push(cert.clone());
        }
        for (rule, configs) in &d.http_rules {
            plan.upsert_http.push((rule.clone(), configs.clone()));
        }
        for rule in &d.tcp_rules {
            plan.upsert_tcp.push(rule.clone());
        }
    }

    for rule in current_http {
        if !desired_http_ids.contains(rule.uuid.as_str()) {
            plan.delete_config_rule_ids.push(rule.uuid.clone());
            plan.delete_http_rule_ids.push(rule.uuid.clone());
            // The cert may be orphaned once the rule goes; the store
            // re-checks references inside the transaction.
            if let Some(cert_id) = &rule.certificate_id {
                if !plan.delete_certificate_ids.contains(cert_id) {
                    plan.delete_certificate_ids.push(cert_id.clone());
                }
            }
        }
    }
    for rule in current_tcp {
        if !desired_tcp_ids.contains(rule.uuid.as_str()) {
            plan.delete_config_rule_ids.push(rule.uuid.clone());
            plan.delete_tcp_rule_ids.push(rule.uuid.clone());
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_rule(uuid: &str, service_id: &str, cert: Option<&str>) -> HttpRuleRecord {
        HttpRuleRecord {
            uuid: uuid.to_string(),
            service_id: service_id.to_string(),
            container_port: 5000,
            domain: format!("{uuid}.example.com"),
            path: "/".to_string(),
            header: String::new(),
            cookie: String::new(),
            weight: 100,
            ip: String::new(),
            certificate_id: cert.map(str::to_string),
        }
    }

    fn tcp_rule(uuid: &str, service_id: &str, port: i32) -> TcpRuleRecord {
        TcpRuleRecord {
            uuid: uuid.to_string(),
            service_id: service_id.to_string(),
            container_port: 3306,
            ip: "0.0.0.0".to_string(),
            port,
        }
    }

    #[test]
    fn test_plan_upserts_and_deletes() {
        let current_http = vec![
            http_rule("keep", "s1", None),
            http_rule("drop", "s1", Some("cert-1")),
        ];
        let current_tcp = vec![tcp_rule("tcp-drop", "s1", 10001)];

        let desired = vec![DesiredComponentRules {
            service_id: "s1".to_string(),
            http_rules: vec![
                (http_rule("keep", "s1", None), vec![]),
                (http_rule("new", "s1", None), vec![]),
            ],
            tcp_rules: vec![tcp_rule("tcp-new", "s1", 10002)],
            certificates: vec![],
        }];

        let plan = compute_sync_plan(&current_http, &current_tcp, &desired);

        assert_eq!(plan.upsert_http.len(), 2);
        assert_eq!(plan.upsert_tcp.len(), 1);
        assert_eq!(plan.delete_http_rule_ids, vec!["drop"]);
        assert_eq!(plan.delete_tcp_rule_ids, vec!["tcp-drop"]);
        // Configs go for every deleted rule, of either family.
        assert_eq!(plan.delete_config_rule_ids, vec!["drop", "tcp-drop"]);
        // The deleted rule's certificate is queued for orphan pruning.
        assert_eq!(plan.delete_certificate_ids, vec!["cert-1"]);
    }

    #[test]
    fn test_empty_snapshot_deletes_everything() {
        let current_http = vec![http_rule("a", "s1", None)];
        let current_tcp = vec![tcp_rule("b", "s1", 10000)];
        let desired = vec![DesiredComponentRules {
            service_id: "s1".to_string(),
            ..Default::default()
        }];

        let plan = compute_sync_plan(&current_http, &current_tcp, &desired);
        assert!(plan.upsert_http.is_empty());
        assert_eq!(plan.delete_http_rule_ids, vec!["a"]);
        assert_eq!(plan.delete_tcp_rule_ids, vec!["b"]);
    }
}
