// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

use utoipa::OpenApi;

use crate::handler::http::{admin, health, logs, metrics, sensors};
use crate::meta;

#[derive(OpenApi)]
#[openapi(
    paths(
        logs::ingest,
        metrics::ingest,
        sensors::heartbeat,
        sensors::config,
        sensors::results,
        admin::reload_admission,
        health::healthz,
        health::metrics,
    ),
    components(schemas(
        logs::LogsIngestRequest,
        logs::LogEntryWire,
        metrics::MetricSampleWire,
        metrics::MetricsIngestRequest,
        meta::Severity,
        meta::MetricType,
        meta::Check,
        meta::CheckType,
        meta::CheckStatus,
        meta::CheckResult,
        meta::CheckResultBatch,
    )),
    tags(
        (name = "logs", description = "Log ingestion"),
        (name = "metrics", description = "Metric sample ingestion"),
        (name = "sensors", description = "Sensor agent interfaces"),
        (name = "admin", description = "Control-plane administration"),
        (name = "health", description = "Liveness and ambient metrics"),
    )
)]
pub struct ApiDoc;
