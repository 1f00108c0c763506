// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Seed scenario 1 (spec §8): a single HTTP log ends up as exactly one
//! `logs:raw` entry and, once transformed, one ECS document in the
//! expected daily index with the expected fields.

mod support;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use chrono::Utc;
use killkrill::{
    ecs::build_document,
    handler::http::router,
    meta::LogFormat,
};
use std::net::SocketAddr;
use tower::ServiceExt;
use uuid::Uuid;

fn log_source(cidr: &str) -> killkrill::meta::LogSource {
    killkrill::meta::LogSource {
        id: Uuid::now_v7(),
        name: "s1".into(),
        application: "a".into(),
        api_key_hash: "unused".into(),
        format_hint: LogFormat::Rfc3164,
        syslog_port: None,
        allowed_cidrs: vec![cidr.to_string()],
        enabled: true,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn single_log_becomes_one_stream_entry_and_one_ecs_document() {
    let (core, bus) = support::test_core(vec![log_source("127.0.0.1/32")]);
    let app = router(core);

    let body = serde_json::json!({
        "source": "s1",
        "application": "a",
        "logs": [{
            "log_level": "info",
            "message": "hello",
            "service_name": "svc",
            "timestamp": "2025-01-01T00:00:00Z",
        }],
    });

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("content-type", "application/json")
        .header("x-client-cert", "test-cert")
        .extension(ConnectInfo("127.0.0.1:9000".parse::<SocketAddr>().unwrap()))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["processed"], 1);

    let entries = bus.entries_for("logs:raw");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "hello");
    assert_eq!(entries[0]["log_level"], "info");

    let doc = build_document(&entries[0], "1-0", "killkrill");
    assert_eq!(doc.index_name, "killkrill-logs-2025.01.01");
    assert_eq!(doc.body["message"], "hello");
    assert_eq!(doc.body["log"]["level"], "info");
}

#[tokio::test]
async fn unknown_source_is_rejected_with_404() {
    let (core, _bus) = support::test_core(vec![]);
    let app = router(core);

    let body = serde_json::json!({
        "source": "does-not-exist",
        "application": "a",
        "logs": [{"log_level": "info", "message": "hi", "service_name": "svc"}],
    });

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("content-type", "application/json")
        .header("x-client-cert", "test-cert")
        .extension(ConnectInfo("127.0.0.1:9000".parse::<SocketAddr>().unwrap()))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_credentials_are_rejected_with_401() {
    let (core, _bus) = support::test_core(vec![log_source("127.0.0.1/32")]);
    let app = router(core);

    let body = serde_json::json!({
        "source": "s1",
        "application": "a",
        "logs": [{"log_level": "info", "message": "hi", "service_name": "svc"}],
    });

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("content-type", "application/json")
        .extension(ConnectInfo("127.0.0.1:9000".parse::<SocketAddr>().unwrap()))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
