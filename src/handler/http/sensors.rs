// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Sensor agent interfaces (spec §4.9/§6): heartbeat, active check
//! config, and result submission. Authenticated solely by `X-API-Key`
//! whose SHA-256 matches the agent's stored `api_key_hash` — independent
//! of the general Multi-Auth contract used by the log/metric receivers
//! (spec.md §9 Open Question, resolved in DESIGN.md: only the wrapped
//! `{results:[...]}` form is accepted).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    auth::hash_api_key,
    core::Core,
    error::Error,
    meta::{Check, CheckResultBatch, CheckType, SensorAgent},
};

async fn fetch_agent_by_key_hash(hash: &str) -> crate::error::Result<Option<SensorAgent>> {
    let row = sqlx::query(
        "SELECT id, name, location, api_key_hash, active, last_seen_at FROM sensor_agents WHERE api_key_hash = $1",
    )
    .bind(hash)
    .fetch_optional(infra::db::pool())
    .await?;

    Ok(match row {
        Some(row) => Some(SensorAgent {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            api_key_hash: row.try_get("api_key_hash")?,
            active: row.try_get("active")?,
            last_seen_at: row.try_get("last_seen_at")?,
        }),
        None => None,
    })
}

async fn fetch_checks_for_agent(agent_id: Uuid) -> crate::error::Result<Vec<Check>> {
    let rows = sqlx::query(
        "SELECT id, agent_id, name, check_type, target_host, port, path, expected_status, timeout_ms, interval_ms, headers, enabled \
         FROM checks WHERE agent_id = $1 AND enabled = true",
    )
    .bind(agent_id)
    .fetch_all(infra::db::pool())
    .await?;

    let mut checks = Vec::with_capacity(rows.len());
    for row in rows {
        let check_type_raw: String = row.try_get("check_type")?;
        let port: i32 = row.try_get("port")?;
        let expected_status: Option<i32> = row.try_get("expected_status")?;
        let headers_json: serde_json::Value = row.try_get("headers")?;
        checks.push(Check {
            id: row.try_get("id")?,
            agent_id: row.try_get("agent_id")?,
            name: row.try_get("name")?,
            check_type: check_type_raw.parse::<CheckType>().unwrap_or(CheckType::Tcp),
            target_host: row.try_get("target_host")?,
            port: port as u16,
            path: row.try_get("path")?,
            expected_status: expected_status.map(|s| s as u16),
            timeout_ms: { let v: i64 = row.try_get("timeout_ms")?; v as u64 },
            interval_ms: { let v: i64 = row.try_get("interval_ms")?; v as u64 },
            headers: serde_json::from_value(headers_json).unwrap_or_default(),
            enabled: row.try_get("enabled")?,
        });
    }
    Ok(checks)
}

/// Resolves and caches the calling agent from `X-API-Key`. A cache miss
/// falls through to a database lookup so a freshly registered agent does
/// not need a process restart to authenticate.
async fn authenticate_sensor(headers: &HeaderMap, core: &Core) -> crate::error::Result<SensorAgent> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Authentication("missing X-API-Key header".into()))?;
    let hash = hash_api_key(api_key);

    if let Some(agent) = core.sensor_agent_by_key_hash(&hash) {
        return Ok(agent);
    }

    let agent = fetch_agent_by_key_hash(&hash)
        .await?
        .ok_or_else(|| Error::Authentication("unknown sensor API key".into()))?;
    core.register_sensor_agent(agent.clone());
    Ok(agent)
}

/// `POST /sensors/{agent_id}/heartbeat` (spec §6): updates the agent's
/// last-seen timestamp.
#[utoipa::path(
    post,
    path = "/sensors/{agent_id}/heartbeat",
    params(("agent_id" = Uuid, Path, description = "sensor agent id")),
    responses(
        (status = 200, description = "heartbeat recorded"),
        (status = 401, description = "unknown or missing API key"),
        (status = 403, description = "API key does not belong to agent_id"),
    ),
    tag = "sensors"
)]
pub async fn heartbeat(State(core): State<Arc<Core>>, Path(agent_id): Path<Uuid>, headers: HeaderMap) -> Response {
    let agent = match authenticate_sensor(&headers, &core).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };
    if agent.id != agent_id {
        return Error::Authentication("API key does not belong to this agent".into()).into_response();
    }

    let now = chrono::Utc::now();
    if let Err(e) = sqlx::query("UPDATE sensor_agents SET last_seen_at = $1 WHERE id = $2")
        .bind(now)
        .bind(agent_id)
        .execute(infra::db::pool())
        .await
    {
        return Error::from(e).into_response();
    }

    let mut cached = agent;
    cached.last_seen_at = Some(now);
    core.register_sensor_agent(cached);

    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// `GET /sensors/config/{agent_id}` (spec §6): returns the agent's active
/// check set.
#[utoipa::path(
    get,
    path = "/sensors/config/{agent_id}",
    params(("agent_id" = Uuid, Path, description = "sensor agent id")),
    responses(
        (status = 200, description = "active checks", body = [Check]),
        (status = 401, description = "unknown or missing API key"),
        (status = 403, description = "API key does not belong to agent_id"),
    ),
    tag = "sensors"
)]
pub async fn config(State(core): State<Arc<Core>>, Path(agent_id): Path<Uuid>, headers: HeaderMap) -> Response {
    let agent = match authenticate_sensor(&headers, &core).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };
    if agent.id != agent_id {
        return Error::Authentication("API key does not belong to this agent".into()).into_response();
    }

    let checks = match fetch_checks_for_agent(agent_id).await {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };
    core.set_checks(agent_id, checks.clone());

    Json(checks).into_response()
}

/// `POST /sensors/results` (spec §6/§9): only the wrapped `{results:[...]}`
/// form is accepted. The submitter's authenticated identity, not the
/// request body, is trusted for `agent_id` on every result.
#[utoipa::path(
    post,
    path = "/sensors/results",
    request_body = CheckResultBatch,
    responses(
        (status = 200, description = "results recorded"),
        (status = 400, description = "malformed body"),
        (status = 401, description = "unknown or missing API key"),
    ),
    tag = "sensors"
)]
pub async fn results(State(core): State<Arc<Core>>, headers: HeaderMap, Json(mut batch): Json<CheckResultBatch>) -> Response {
    let agent = match authenticate_sensor(&headers, &core).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };

    for result in &mut batch.results {
        result.agent_id = agent.id;
    }

    let mut processed = 0u32;
    for result in &batch.results {
        let inserted = sqlx::query(
            "INSERT INTO check_results (id, agent_id, check_id, status, response_ms, status_code, error_message, tls_valid, tls_expires_at, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::now_v7())
        .bind(result.agent_id)
        .bind(result.check_id)
        .bind(result.status.to_string())
        .bind(result.response_ms.map(|v| v as i64))
        .bind(result.status_code.map(|v| v as i32))
        .bind(&result.error_message)
        .bind(result.tls_valid)
        .bind(result.tls_expires_at)
        .bind(result.observed_at)
        .execute(infra::db::pool())
        .await;

        match inserted {
            Ok(_) => processed += 1,
            Err(e) => return Error::from(e).into_response(),
        }
    }

    (StatusCode::OK, Json(serde_json::json!({ "status": "success", "processed": processed }))).into_response()
}
