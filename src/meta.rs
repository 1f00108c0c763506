// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Data model shared by receivers, the stream bus, and the workers
//! (spec §3). These are plain structs — persistence, where it exists,
//! lives in `infra::db`; nothing here talks to a database directly.

use std::{collections::BTreeMap, net::IpAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Rfc3164,
    Rfc5424,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSource {
    pub id: Uuid,
    pub name: String,
    pub application: String,
    pub api_key_hash: String,
    pub format_hint: LogFormat,
    pub syslog_port: Option<u16>,
    pub allowed_cidrs: Vec<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl LogSource {
    /// spec §4.1: a non-empty allowlist admits only matching peers; an
    /// empty allowlist admits nothing. Malformed CIDR strings are skipped
    /// rather than rejecting the whole source.
    pub fn is_allowed(&self, peer: IpAddr) -> bool {
        self.allowed_cidrs
            .iter()
            .filter_map(|cidr| cidr.parse::<ipnet::IpNet>().ok())
            .any(|net| net.contains(&peer))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, utoipa::ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub facility: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub trace: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub labels: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub metric_type: MetricType,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, utoipa::ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorAgent {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub api_key_hash: String,
    pub active: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, utoipa::ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Tcp,
    Http,
    Https,
    Dns,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Check {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    pub check_type: CheckType,
    pub target_host: String,
    pub port: u16,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expected_status: Option<u16>,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub enabled: bool,
}

impl Check {
    /// spec §8 boundary: `interval=1s, timeout=999ms` is valid;
    /// `interval=1s, timeout=1s` is rejected.
    pub fn is_valid(&self) -> bool {
        self.timeout_ms < self.interval_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, utoipa::ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
    Timeout,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CheckResult {
    pub agent_id: Uuid,
    pub check_id: Uuid,
    pub status: CheckStatus,
    #[serde(default)]
    pub response_ms: Option<u64>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub tls_valid: Option<bool>,
    #[serde(default)]
    pub tls_expires_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// Wire shape for `POST /sensors/results` — only the wrapped form is
/// accepted (spec.md §9 Open Question, resolved in DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CheckResultBatch {
    pub results: Vec<CheckResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub key_hash: String,
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub access: String,
    pub refresh: String,
    pub not_after: DateTime<Utc>,
}

impl Token {
    /// True once `now >= not_after - 5min` (spec §8 testable property).
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.not_after - chrono::Duration::minutes(5)
    }
}

/// Bookkeeping view of a stream bus consumer group, surfaced by the
/// control surface for observability — not a separate storage concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub stream: String,
    pub group: String,
    pub pending: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_validity_boundary() {
        let mut c = Check {
            id: Uuid::nil(),
            agent_id: Uuid::nil(),
            name: "disk".into(),
            check_type: CheckType::Tcp,
            target_host: "10.0.0.1".into(),
            port: 443,
            path: None,
            expected_status: None,
            interval_ms: 1000,
            timeout_ms: 999,
            headers: BTreeMap::new(),
            enabled: true,
        };
        assert!(c.is_valid());
        c.timeout_ms = 1000;
        assert!(!c.is_valid());
    }

    #[test]
    fn token_expiry_five_minute_window() {
        let not_after = Utc::now() + chrono::Duration::minutes(4);
        let token = Token {
            access: "a".into(),
            refresh: "r".into(),
            not_after,
        };
        assert!(token.is_expired());

        let not_after = Utc::now() + chrono::Duration::minutes(10);
        let token = Token {
            access: "a".into(),
            refresh: "r".into(),
            not_after,
        };
        assert!(!token.is_expired());
    }
}
