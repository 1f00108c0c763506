// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Unauthenticated operational endpoints (spec §4.9/§10): a liveness
//! probe that checks the database and stream bus, and the Prometheus
//! text exposition of the process's own ambient metrics.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::core::Core;

/// Returns `"ok"` or `"error:<reason>"` (spec §6's
/// `components:{database,redis,…:"ok"|"error:…"}` shape).
async fn check_db() -> String {
    match sqlx::query("SELECT 1").execute(infra::db::pool()).await {
        Ok(_) => "ok".to_string(),
        Err(err) => format!("error:{err}"),
    }
}

async fn check_redis(core: &Core) -> String {
    match core.stream_bus.stream_length("logs:raw").await {
        Ok(_) => "ok".to_string(),
        Err(err) => format!("error:{err}"),
    }
}

/// `GET /healthz` (spec §4.9): degraded when only one backing dependency
/// is reachable, unhealthy when neither is.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "healthy"), (status = 503, description = "degraded or unhealthy")),
    tag = "health"
)]
pub async fn healthz(State(core): State<Arc<Core>>) -> Response {
    let database = check_db().await;
    let redis = check_redis(&core).await;
    let db_ok = database == "ok";
    let bus_ok = redis == "ok";

    let status = match (db_ok, bus_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };
    let code = if status == "healthy" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(json!({
            "status": status,
            "components": { "database": database, "redis": redis },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// `GET /metrics` (spec §4.9/SPEC_FULL §ambient stack): Prometheus text
/// exposition of this process's own counters, not the ingested samples.
#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, description = "Prometheus text exposition")),
    tag = "health"
)]
pub async fn metrics() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::encode(),
    )
        .into_response()
}
