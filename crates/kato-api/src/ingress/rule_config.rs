// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-rule gateway configuration.
//!
//! Console intent (proxy timeouts, buffer sizes, custom headers,
//! rewrites) is translated verbatim into one backing row per directive
//! key. Duplicate header keys are deduplicated last-writer-wins; blank
//! header values become the literal string `empty` so the data plane
//! can distinguish "unset header" from "header with no value".

use serde::{Deserialize, Serialize};

use kato_store::types::RuleConfigRecord;

use crate::error::{ApiError, Result};

/// Valid rewrite flags.
const REWRITE_FLAGS: [&str; 4] = ["last", "break", "redirect", "permanent"];

/// One custom header directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderItem {
    /// Header name.
    pub key: String,
    /// Header value; blank normalizes to `empty`.
    #[serde(default)]
    pub value: String,
}

/// One rewrite directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteItem {
    /// Match expression.
    pub regex: String,
    /// Replacement.
    pub replacement: String,
    /// One of `last`, `break`, `redirect`, `permanent`.
    pub flag: String,
}

/// Console-facing rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfigSpec {
    /// `proxy-connect-timeout` seconds.
    #[serde(default)]
    pub proxy_connect_timeout: Option<u32>,
    /// `proxy-send-timeout` seconds.
    #[serde(default)]
    pub proxy_send_timeout: Option<u32>,
    /// `proxy-read-timeout` seconds.
    #[serde(default)]
    pub proxy_read_timeout: Option<u32>,
    /// `proxy-body-size` megabytes; zero disables the limit.
    #[serde(default)]
    pub proxy_body_size: Option<u32>,
    /// `proxy-buffer-size` kilobytes, 1..=65535.
    #[serde(default)]
    pub proxy_buffer_size: Option<u32>,
    /// `proxy-buffer-numbers`, 1..=65535.
    #[serde(default)]
    pub proxy_buffer_numbers: Option<u32>,
    /// `proxy-buffering`, `on` or `off`.
    #[serde(default)]
    pub proxy_buffering: Option<String>,
    /// Custom headers.
    #[serde(default)]
    pub set_headers: Vec<HeaderItem>,
    /// Rewrite rules.
    #[serde(default)]
    pub rewrites: Vec<RewriteItem>,
}

impl RuleConfigSpec {
    /// Translate into backing rows for a rule, validating ranges and
    /// normalizing headers.
    pub fn into_rows(&self, rule_id: &str) -> Result<Vec<RuleConfigRecord>> {
        let mut rows: Vec<RuleConfigRecord> = Vec::new();
        let mut push = |key: String, value: String| {
            rows.push(RuleConfigRecord {
                rule_id: rule_id.to_string(),
                key,
                value,
            });
        };

        if let Some(v) = self.proxy_connect_timeout {
            push("proxy-connect-timeout".into(), v.to_string());
        }
        if let Some(v) = self.proxy_send_timeout {
            push("proxy-send-timeout".into(), v.to_string());
        }
        if let Some(v) = self.proxy_read_timeout {
            push("proxy-read-timeout".into(), v.to_string());
        }
        if let Some(v) = self.proxy_body_size {
            push("proxy-body-size".into(), v.to_string());
        }
        if let Some(v) = self.proxy_buffer_size {
            if !(1..=65535).contains(&v) {
                return Err(ApiError::Validation(
                    "proxy-buffer-size must be between 1 and 65535".to_string(),
                ));
            }
            push("proxy-buffer-size".into(), v.to_string());
        }
        if let Some(v) = self.proxy_buffer_numbers {
            if !(1..=65535).contains(&v) {
                return Err(ApiError::Validation(
                    "proxy-buffer-numbers must be between 1 and 65535".to_string(),
                ));
            }
            push("proxy-buffer-numbers".into(), v.to_string());
        }
        if let Some(v) = &self.proxy_buffering {
            if v != "on" && v != "off" {
                return Err(ApiError::Validation(
                    "proxy-buffering must be 'on' or 'off'".to_string(),
                ));
            }
            push("proxy-buffering".into(), v.clone());
        }

        for row in set_headers(rule_id, &self.set_headers) {
            rows.push(row);
        }

        for (i, rewrite) in self.rewrites.iter().enumerate() {
            if !REWRITE_FLAGS.contains(&rewrite.flag.as_str()) {
                return Err(ApiError::Validation(format!(
                    "rewrite flag '{}' is not one of last, break, redirect, permanent",
                    rewrite.flag
                )));
            }
            rows.push(RuleConfigRecord {
                rule_id: rule_id.to_string(),
                key: format!("rewrite-{i}"),
                value: format!("{} {} {}", rewrite.regex, rewrite.replacement, rewrite.flag),
            });
        }

        Ok(rows)
    }
}

/// Header rows for a rule. Duplicate keys keep the last value seen
/// (last-writer-wins, matching the data plane's observed behavior);
/// blank values normalize to the literal `empty`.
pub fn set_headers(rule_id: &str, headers: &[HeaderItem]) -> Vec<RuleConfigRecord> {
    let mut rows: Vec<RuleConfigRecord> = Vec::new();
    for header in headers {
        if header.key.is_empty() {
            continue;
        }
        let value = if header.value.is_empty() {
            "empty".to_string()
        } else {
            header.value.clone()
        };
        let key = format!("set-header-{}", header.key);
        match rows.iter().position(|r| r.key == key) {
            Some(i) => rows[i].value = value,
            None => rows.push(RuleConfigRecord {
                rule_id: rule_id.to_string(),
                key,
                value,
            }),
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(key: &str, value: &str) -> HeaderItem {
        HeaderItem {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_set_headers_dedup_last_writer_wins() {
        let rows = set_headers(
            "r1",
            &[
                header("Host", "a.example.com"),
                header("X-Scheme", ""),
                header("Host", "b.example.com"),
            ],
        );
        // Exactly one row per unique key.
        assert_eq!(rows.len(), 2);
        let host = rows.iter().find(|r| r.key == "set-header-Host").unwrap();
        assert_eq!(host.value, "b.example.com");
        let scheme = rows.iter().find(|r| r.key == "set-header-X-Scheme").unwrap();
        assert_eq!(scheme.value, "empty");
    }

    #[test]
    fn test_buffer_ranges() {
        let spec = RuleConfigSpec {
            proxy_buffer_size: Some(0),
            ..Default::default()
        };
        assert!(spec.into_rows("r1").is_err());

        let spec = RuleConfigSpec {
            proxy_buffer_numbers: Some(65536),
            ..Default::default()
        };
        assert!(spec.into_rows("r1").is_err());

        let spec = RuleConfigSpec {
            proxy_buffer_size: Some(8),
            proxy_buffer_numbers: Some(4),
            ..Default::default()
        };
        assert_eq!(spec.into_rows("r1").unwrap().len(), 2);
    }

    #[test]
    fn test_buffering_and_rewrite_validation() {
        let spec = RuleConfigSpec {
            proxy_buffering: Some("maybe".to_string()),
            ..Default::default()
        };
        assert!(spec.into_rows("r1").is_err());

        let spec = RuleConfigSpec {
            rewrites: vec![RewriteItem {
                regex: "^/old/(.*)$".to_string(),
                replacement: "/new/$1".to_string(),
                flag: "sometimes".to_string(),
            }],
            ..Default::default()
        };
        assert!(spec.into_rows("r1").is_err());

        let spec = RuleConfigSpec {
            proxy_buffering: Some("off".to_string()),
            rewrites: vec![RewriteItem {
                regex: "^/old/(.*)$".to_string(),
                replacement: "/new/$1".to_string(),
                flag: "break".to_string(),
            }],
            ..Default::default()
        };
        let rows = spec.into_rows("r1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key, "rewrite-0");
        assert_eq!(rows[1].value, "^/old/(.*)$ /new/$1 break");
    }

    #[test]
    fn test_timeout_rows_translated_verbatim() {
        let spec = RuleConfigSpec {
            proxy_connect_timeout: Some(75),
            proxy_send_timeout: Some(60),
            proxy_read_timeout: Some(60),
            proxy_body_size: Some(0),
            ..Default::default()
        };
        let rows = spec.into_rows("r1").unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "proxy-connect-timeout",
                "proxy-send-timeout",
                "proxy-read-timeout",
                "proxy-body-size"
            ]
        );
        assert_eq!(rows[0].value, "75");
    }
}
