// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! HTTP log ingestion (spec §4.2, §6): validates, admission-filters, and
//! appends a batch of log entries to the `logs:raw` stream. The durable,
//! best-effort audit write spec §4.2 describes is the stream append
//! itself — the Stream Bus is already the durable store (see DESIGN.md);
//! no parallel Postgres insert duplicates it.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{auth::AuthContext, core::Core, error::Error, meta::Severity};

const MAX_BATCH: usize = 1000;
const MAX_MESSAGE_LEN: usize = 10_000;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogsIngestRequest {
    pub source: String,
    pub application: String,
    pub logs: Vec<LogEntryWire>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogEntryWire {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub log_level: Severity,
    pub message: String,
    pub service_name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub logger_name: Option<String>,
    #[serde(default)]
    pub thread_name: Option<String>,
    #[serde(default = "default_ecs_version")]
    pub ecs_version: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub span_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_stack_trace: Option<String>,
}

fn default_ecs_version() -> String {
    "8.0".to_string()
}

fn validate(req: &LogsIngestRequest) -> Result<(), Error> {
    if req.logs.is_empty() || req.logs.len() > MAX_BATCH {
        return Err(Error::Validation(format!(
            "logs batch must contain 1..={MAX_BATCH} entries, got {}",
            req.logs.len()
        )));
    }
    for entry in &req.logs {
        if entry.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(Error::Validation(format!("message exceeds {MAX_MESSAGE_LEN} characters")));
        }
    }
    Ok(())
}

fn entry_fields(req: &LogsIngestRequest, entry: &LogEntryWire, source_id: &str, source_ip: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("message".into(), entry.message.clone());
    fields.insert("log_level".into(), entry.log_level.to_string());
    fields.insert("service_name".into(), entry.service_name.clone());
    fields.insert("ecs_version".into(), entry.ecs_version.clone());
    fields.insert("source_id".into(), source_id.to_string());
    fields.insert("source_ip".into(), source_ip.to_string());
    fields.insert("protocol".into(), "http".into());
    fields.insert("application".into(), req.application.clone());
    fields.insert(
        "timestamp".into(),
        entry.timestamp.unwrap_or_else(Utc::now).to_rfc3339(),
    );
    if let Some(v) = &entry.hostname {
        fields.insert("hostname".into(), v.clone());
    }
    if let Some(v) = &entry.logger_name {
        fields.insert("logger_name".into(), v.clone());
    }
    if let Some(v) = &entry.thread_name {
        fields.insert("thread_name".into(), v.clone());
    }
    if let Some(v) = &entry.trace_id {
        fields.insert("trace_id".into(), v.clone());
    }
    if let Some(v) = &entry.span_id {
        fields.insert("span_id".into(), v.clone());
    }
    if let Some(v) = &entry.transaction_id {
        fields.insert("transaction_id".into(), v.clone());
    }
    if let Some(v) = &entry.error_type {
        fields.insert("error_type".into(), v.clone());
    }
    if let Some(v) = &entry.error_message {
        fields.insert("error_message".into(), v.clone());
    }
    if let Some(v) = &entry.error_stack_trace {
        fields.insert("error_stack_trace".into(), v.clone());
    }
    if let Some(labels) = &entry.labels {
        if let Ok(s) = serde_json::to_string(labels) {
            fields.insert("labels".into(), s);
        }
    }
    if let Some(tags) = &entry.tags {
        if let Ok(s) = serde_json::to_string(tags) {
            fields.insert("tags".into(), s);
        }
    }
    fields
}

/// Accepts a batch of logs for one registered source (spec §6).
#[utoipa::path(
    post,
    path = "/api/v1/logs",
    request_body = LogsIngestRequest,
    responses(
        (status = 200, description = "all entries appended"),
        (status = 400, description = "malformed body or oversized batch/message"),
        (status = 401, description = "missing or invalid credentials"),
        (status = 403, description = "peer not in source's CIDR allowlist"),
        (status = 404, description = "unknown source"),
        (status = 503, description = "stream bus append failed"),
    ),
    tag = "logs"
)]
pub async fn ingest(
    State(core): State<Arc<Core>>,
    Extension(_auth): Extension<AuthContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<LogsIngestRequest>,
) -> Response {
    if let Err(e) = validate(&req) {
        return e.into_response();
    }

    let Some(source) = core.get_source(&req.source).filter(|s| s.enabled) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown source: {}", req.source) })),
        )
            .into_response();
    };
    if !source.is_allowed(peer.ip()) {
        return Error::Admission(format!("{} not allowed for source {}", peer.ip(), req.source)).into_response();
    }

    let source_id = source.id.to_string();
    let source_ip = peer.ip().to_string();
    let mut processed = 0u32;
    for entry in &req.logs {
        let fields = entry_fields(&req, entry, &source_id, &source_ip);
        match core.stream_bus.append("logs:raw", fields).await {
            Ok(_) => processed += 1,
            Err(_) => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "status": "partial", "processed": processed })),
                )
                    .into_response();
            }
        }
    }

    (StatusCode::OK, Json(json!({ "status": "success", "processed": processed }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_entry(message: &str) -> LogEntryWire {
        LogEntryWire {
            timestamp: None,
            log_level: Severity::Info,
            message: message.to_string(),
            service_name: "svc".into(),
            hostname: None,
            logger_name: None,
            thread_name: None,
            ecs_version: default_ecs_version(),
            labels: None,
            tags: None,
            trace_id: None,
            span_id: None,
            transaction_id: None,
            error_type: None,
            error_message: None,
            error_stack_trace: None,
        }
    }

    #[test]
    fn batch_of_1000_accepted_1001_rejected() {
        let at_limit = LogsIngestRequest {
            source: "s1".into(),
            application: "a".into(),
            logs: (0..1000).map(|_| wire_entry("x")).collect(),
        };
        assert!(validate(&at_limit).is_ok());

        let over_limit = LogsIngestRequest {
            source: "s1".into(),
            application: "a".into(),
            logs: (0..1001).map(|_| wire_entry("x")).collect(),
        };
        assert!(validate(&over_limit).is_err());
    }

    #[test]
    fn message_exactly_10000_chars_accepted_10001_rejected() {
        let req = LogsIngestRequest {
            source: "s1".into(),
            application: "a".into(),
            logs: vec![wire_entry(&"a".repeat(10_000))],
        };
        assert!(validate(&req).is_ok());

        let req = LogsIngestRequest {
            source: "s1".into(),
            application: "a".into(),
            logs: vec![wire_entry(&"a".repeat(10_001))],
        };
        assert!(validate(&req).is_err());
    }

    #[test]
    fn empty_batch_rejected() {
        let req = LogsIngestRequest {
            source: "s1".into(),
            application: "a".into(),
            logs: vec![],
        };
        assert!(validate(&req).is_err());
    }

    #[test]
    fn entry_fields_preserve_ecs_ready_keys_verbatim() {
        let req = LogsIngestRequest {
            source: "s1".into(),
            application: "billing".into(),
            logs: vec![],
        };
        let mut entry = wire_entry("hello");
        entry.trace_id = Some("trace-1".into());
        let fields = entry_fields(&req, &entry, "src-id", "10.0.0.1");
        assert_eq!(fields["message"], "hello");
        assert_eq!(fields["trace_id"], "trace-1");
        assert_eq!(fields["application"], "billing");
        assert_eq!(fields["protocol"], "http");
    }
}
