// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Admission-rule reload (spec §4.9/§4.1): re-reads the `log_sources`
//! table and atomically swaps both the in-memory source registry and the
//! `AdmissionFilter` snapshot it is derived from.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    admission::AdmissionSnapshot,
    auth::AuthContext,
    core::Core,
    error::Error,
    meta::{LogFormat, LogSource},
};

async fn load_sources() -> crate::error::Result<Vec<LogSource>> {
    let rows = sqlx::query(
        "SELECT id, name, application, api_key_hash, format_hint, syslog_port, allowed_cidrs, enabled, created_at FROM log_sources",
    )
    .fetch_all(infra::db::pool())
    .await?;

    let mut sources = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let format_raw: String = row.try_get("format_hint")?;
        let format_hint = format_raw.parse::<LogFormat>().unwrap_or(LogFormat::Rfc3164);
        let syslog_port: Option<i32> = row.try_get("syslog_port")?;
        sources.push(LogSource {
            id,
            name: row.try_get("name")?,
            application: row.try_get("application")?,
            api_key_hash: row.try_get("api_key_hash")?,
            format_hint,
            syslog_port: syslog_port.map(|p| p as u16),
            allowed_cidrs: row.try_get("allowed_cidrs")?,
            enabled: row.try_get("enabled")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(sources)
}

/// Re-reads all log sources and atomically swaps the Admission Filter
/// snapshot (spec §4.1). Requires the `admin` permission.
#[utoipa::path(
    post,
    path = "/admin/admission/reload",
    responses(
        (status = 200, description = "snapshot reloaded"),
        (status = 401, description = "missing or invalid credentials"),
        (status = 403, description = "caller lacks the admin permission"),
        (status = 503, description = "database unavailable"),
    ),
    tag = "admin"
)]
pub async fn reload_admission(State(core): State<Arc<Core>>, Extension(auth): Extension<AuthContext>) -> axum::response::Response {
    if !auth.has_permission("admin") {
        return Error::Authentication("admin permission required".into()).into_response();
    }

    let sources = match load_sources().await {
        Ok(s) => s,
        Err(e) => return Error::Resource(format!("failed to load sources: {e}")).into_response(),
    };

    for source in &sources {
        core.register_source(source.clone());
    }
    core.admission.reload(AdmissionSnapshot::from_sources(&sources));

    (StatusCode::OK, Json(json!({ "status": "reloaded", "sources": sources.len() }))).into_response()
}
