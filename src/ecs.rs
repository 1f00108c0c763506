// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Transforms one `logs:raw` stream entry into an ECS-compliant document
//! (spec §4.5). Pure function of `(fields, entry_id, now)` — no I/O, so the
//! Log Worker can unit-test conversion without a stream bus or a search
//! index behind it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// The finished document plus the index it belongs in and the id it
/// should be written under.
pub struct EcsDocument {
    pub index_name: String,
    pub doc_id: String,
    pub body: Value,
}

/// Document id is the hex SHA-256 of the original stream entry id (spec
/// §4.5 point 4, §8 testable property) — redelivering the same entry
/// always yields the same id, so retries are idempotent at the index.
pub fn document_id(entry_id: &str) -> String {
    hex::encode(Sha256::digest(entry_id.as_bytes()))
}

/// Index name with daily rollover: `{prefix}-logs-YYYY.MM.DD`, derived
/// from the document's own `@timestamp`, not wall-clock ingest time.
pub fn index_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-logs-{}", at.format("%Y.%m.%d"))
}

fn parse_timestamp(fields: &BTreeMap<String, String>) -> DateTime<Utc> {
    fields
        .get("timestamp")
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn parse_json_map(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|v| v.is_object())
}

fn parse_json_array(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|v| v.is_array())
}

/// Builds the ECS document for one `logs:raw` entry. Never fails — a
/// malformed field is simply omitted (spec §7's "poisonous record" policy
/// is enforced by the caller, which counts conversion problems but always
/// gets a document back here).
pub fn build_document(fields: &BTreeMap<String, String>, entry_id: &str, index_prefix: &str) -> EcsDocument {
    let at = parse_timestamp(fields);
    let now = Utc::now();

    let mut body = json!({
        "@timestamp": at.to_rfc3339(),
        "ecs": { "version": fields.get("ecs_version").cloned().unwrap_or_else(|| "8.0".to_string()) },
        "event": {
            "created": now.to_rfc3339(),
            "dataset": "killkrill.logs",
            "ingested": now.to_rfc3339(),
            "kind": "event",
            "module": "killkrill",
            "type": ["info"],
        },
        "log": {
            "level": fields.get("log_level").or_else(|| fields.get("severity")).cloned().unwrap_or_else(|| "info".to_string()),
            "logger": fields.get("logger_name").or_else(|| fields.get("program")).cloned().unwrap_or_default(),
        },
        "message": fields.get("message").cloned().unwrap_or_default(),
        "service": {
            "name": fields.get("service_name").or_else(|| fields.get("application")).cloned().unwrap_or_else(|| "unknown".to_string()),
            "type": "application",
        },
        "host": {
            "name": fields.get("hostname").cloned().unwrap_or_default(),
            "ip": fields.get("source_ip").cloned().unwrap_or_default(),
        },
        "source": {
            "ip": fields.get("source_ip").cloned().unwrap_or_default(),
        },
        "killkrill": {
            "source_id": fields.get("source_id").cloned(),
            "protocol": fields.get("protocol").cloned().unwrap_or_else(|| "unknown".to_string()),
            "message_id": entry_id,
            "facility": fields.get("facility").cloned().unwrap_or_default(),
            "raw_log": fields.get("raw_log").cloned().unwrap_or_default(),
        },
    });

    let obj = body.as_object_mut().expect("body is always an object");

    let mut trace = serde_json::Map::new();
    if let Some(trace_id) = fields.get("trace_id") {
        trace.insert("id".into(), json!(trace_id));
    }
    if let Some(span_id) = fields.get("span_id") {
        trace.insert("span".into(), json!({ "id": span_id }));
    }
    if let Some(txn_id) = fields.get("transaction_id") {
        trace.insert("transaction".into(), json!({ "id": txn_id }));
    }
    if !trace.is_empty() {
        obj.insert("trace".into(), Value::Object(trace));
    }

    if fields.get("error_type").is_some()
        || fields.get("error_message").is_some()
        || fields.get("error_stack_trace").is_some()
    {
        obj.insert(
            "error".into(),
            json!({
                "type": fields.get("error_type").cloned().unwrap_or_default(),
                "message": fields.get("error_message").cloned().unwrap_or_default(),
                "stack_trace": fields.get("error_stack_trace").cloned().unwrap_or_default(),
            }),
        );
    }

    if let Some(labels) = fields.get("labels").and_then(|raw| parse_json_map(raw)) {
        obj.insert("labels".into(), labels);
    }

    if let Some(tags) = fields.get("tags").and_then(|raw| parse_json_array(raw)) {
        obj.insert("tags".into(), tags);
    }

    EcsDocument {
        index_name: index_name(index_prefix, at),
        doc_id: document_id(entry_id),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn minimal_entry_gets_sane_defaults() {
        let f = fields(&[("message", "hello"), ("log_level", "info"), ("service_name", "svc"), ("timestamp", "2025-01-01T00:00:00Z")]);
        let doc = build_document(&f, "1735689600000-0", "killkrill");
        assert_eq!(doc.index_name, "killkrill-logs-2025.01.01");
        assert_eq!(doc.body["message"], "hello");
        assert_eq!(doc.body["log"]["level"], "info");
        assert_eq!(doc.body["service"]["name"], "svc");
    }

    #[test]
    fn document_id_is_deterministic_hash_of_entry_id() {
        assert_eq!(document_id("1-0"), document_id("1-0"));
        assert_ne!(document_id("1-0"), document_id("1-1"));
        assert_eq!(document_id("1-0").len(), 64);
    }

    #[test]
    fn invalid_timestamp_falls_back_to_now() {
        let f = fields(&[("message", "x"), ("timestamp", "not-a-date")]);
        let doc = build_document(&f, "2-0", "killkrill");
        let today = Utc::now().format("%Y.%m.%d").to_string();
        assert_eq!(doc.index_name, format!("killkrill-logs-{today}"));
    }

    #[test]
    fn optional_trace_and_error_fields_only_appear_when_present() {
        let f = fields(&[("message", "x")]);
        let doc = build_document(&f, "3-0", "killkrill");
        assert!(doc.body.get("trace").is_none());
        assert!(doc.body.get("error").is_none());

        let f = fields(&[("message", "x"), ("trace_id", "abc"), ("error_message", "boom")]);
        let doc = build_document(&f, "4-0", "killkrill");
        assert_eq!(doc.body["trace"]["id"], "abc");
        assert_eq!(doc.body["error"]["message"], "boom");
    }

    #[test]
    fn malformed_labels_json_is_ignored_not_fatal() {
        let f = fields(&[("message", "x"), ("labels", "not json")]);
        let doc = build_document(&f, "5-0", "killkrill");
        assert!(doc.body.get("labels").is_none());
    }

    #[test]
    fn redelivering_same_entry_id_yields_identical_body_modulo_ingested() {
        let f = fields(&[("message", "x"), ("timestamp", "2025-01-01T00:00:00Z")]);
        let mut first = build_document(&f, "6-0", "killkrill").body;
        let mut second = build_document(&f, "6-0", "killkrill").body;
        first["event"]["ingested"] = json!(null);
        second["event"]["ingested"] = json!(null);
        assert_eq!(first, second);
    }
}
