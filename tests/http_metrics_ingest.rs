// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! HTTP metric ingestion (spec §4.3/§6): both wire shapes append to
//! `metrics:raw`, and validation rejects bad names/non-finite values
//! before anything is appended.

mod support;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use killkrill::handler::http::router;
use std::net::SocketAddr;
use tower::ServiceExt;

fn metrics_request(body: serde_json::Value) -> Request<Body> {
    metrics_request_raw(&body.to_string())
}

fn metrics_request_raw(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/metrics")
        .header("content-type", "application/json")
        .header("x-client-cert", "test-cert")
        .extension(ConnectInfo("127.0.0.1:9000".parse::<SocketAddr>().unwrap()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn single_sample_and_batch_forms_both_append() {
    let (core, bus) = support::test_core(vec![]);
    let app = router(core);

    let response = app
        .clone()
        .oneshot(metrics_request(serde_json::json!({
            "name": "http_requests_total",
            "type": "counter",
            "value": 1.0,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(metrics_request(serde_json::json!({
            "metrics": [
                {"name": "queue_depth", "type": "gauge", "value": 3.0},
                {"name": "queue_depth", "type": "gauge", "value": 4.0},
            ],
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["processed"], 2);

    assert_eq!(bus.entries_for("metrics:raw").len(), 3);
}

#[tokio::test]
async fn non_finite_value_rejected_before_append() {
    let (core, bus) = support::test_core(vec![]);
    let app = router(core);

    // an exponent this large overflows to `f64::INFINITY` on parse, while
    // still being syntactically a valid JSON number.
    let response = app
        .oneshot(metrics_request_raw(r#"{"name":"bad_metric","type":"gauge","value":1e400}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(bus.entries_for("metrics:raw").is_empty());
}
