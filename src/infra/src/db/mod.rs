// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Postgres connection pool and static table descriptors. Schema is
//! defined once here as plain `CREATE TABLE` statements and referenced by
//! hand-written, parameterized queries elsewhere — no dynamic query
//! builder or ORM sits between the two.

use once_cell::sync::OnceCell;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::errors::Result;

static POOL: OnceCell<PgPool> = OnceCell::new();

pub async fn init(database_url: &str) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    POOL.set(pool)
        .map_err(|_| crate::errors::Error::Message("db pool already initialized".into()))?;
    Ok(())
}

pub fn pool() -> &'static PgPool {
    POOL.get().expect("db::init was not called before db::pool")
}

/// Table descriptors for the durable slice of the data model (spec §3):
/// `LogSource`, `SensorAgent`, `Check`, `ApiKey`. `LogRecord`/`MetricSample`
/// and the stream/consumer-group bookkeeping live in the Stream Bus, not
/// Postgres — they are transient by design.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS log_sources (
    id              UUID PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    application     TEXT NOT NULL DEFAULT '',
    api_key_hash    TEXT NOT NULL,
    format_hint     TEXT NOT NULL DEFAULT 'rfc3164',
    syslog_port     INTEGER,
    allowed_cidrs   TEXT[] NOT NULL DEFAULT '{}',
    enabled         BOOLEAN NOT NULL DEFAULT true,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS sensor_agents (
    id              UUID PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    location        TEXT,
    api_key_hash    TEXT NOT NULL,
    active          BOOLEAN NOT NULL DEFAULT true,
    last_seen_at    TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS checks (
    id              UUID PRIMARY KEY,
    agent_id        UUID NOT NULL REFERENCES sensor_agents(id),
    name            TEXT NOT NULL,
    check_type      TEXT NOT NULL,
    target_host     TEXT NOT NULL,
    port            INTEGER NOT NULL,
    path            TEXT,
    expected_status INTEGER,
    timeout_ms      BIGINT NOT NULL,
    interval_ms     BIGINT NOT NULL,
    headers         JSONB NOT NULL DEFAULT '{}',
    enabled         BOOLEAN NOT NULL DEFAULT true,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT timeout_lt_interval CHECK (timeout_ms < interval_ms)
);

CREATE TABLE IF NOT EXISTS check_results (
    id              UUID PRIMARY KEY,
    agent_id        UUID NOT NULL REFERENCES sensor_agents(id),
    check_id        UUID NOT NULL REFERENCES checks(id),
    status          TEXT NOT NULL,
    response_ms     BIGINT,
    status_code     INTEGER,
    error_message   TEXT,
    tls_valid       BOOLEAN,
    tls_expires_at  TIMESTAMPTZ,
    observed_at     TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS api_keys (
    id              UUID PRIMARY KEY,
    key_hash        TEXT NOT NULL UNIQUE,
    owner_kind      TEXT NOT NULL,
    owner_id        UUID NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    revoked_at      TIMESTAMPTZ
);
"#;
