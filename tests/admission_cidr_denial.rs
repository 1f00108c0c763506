// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Seed scenario (spec §8): a peer outside a source's CIDR allowlist is
//! rejected at the HTTP boundary before anything reaches the stream bus.

mod support;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use chrono::Utc;
use killkrill::{handler::http::router, meta::LogFormat};
use std::net::SocketAddr;
use tower::ServiceExt;
use uuid::Uuid;

fn restricted_source() -> killkrill::meta::LogSource {
    killkrill::meta::LogSource {
        id: Uuid::now_v7(),
        name: "restricted".into(),
        application: "a".into(),
        api_key_hash: "unused".into(),
        format_hint: LogFormat::Rfc3164,
        syslog_port: None,
        allowed_cidrs: vec!["10.0.0.0/24".to_string()],
        enabled: true,
        created_at: Utc::now(),
    }
}

fn logs_request(peer: &str) -> Request<Body> {
    let body = serde_json::json!({
        "source": "restricted",
        "application": "a",
        "logs": [{"log_level": "info", "message": "hi", "service_name": "svc"}],
    });
    Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("content-type", "application/json")
        .header("x-client-cert", "test-cert")
        .extension(ConnectInfo(peer.parse::<SocketAddr>().unwrap()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn peer_outside_allowlist_gets_403_and_nothing_is_appended() {
    let (core, bus) = support::test_core(vec![restricted_source()]);
    let app = router(core);

    let response = app.oneshot(logs_request("203.0.113.9:9000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(bus.entries_for("logs:raw").is_empty());
}

#[tokio::test]
async fn peer_inside_allowlist_is_admitted() {
    let (core, bus) = support::test_core(vec![restricted_source()]);
    let app = router(core);

    let response = app.oneshot(logs_request("10.0.0.42:9000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["processed"], 1);
    assert_eq!(bus.entries_for("logs:raw").len(), 1);
}
