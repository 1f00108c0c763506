// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! HTTP metric sample ingestion (spec §4.3, §6): accepts a single sample
//! or a `{metrics:[...]}` batch and appends each to the `metrics:raw`
//! stream.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{auth::AuthContext, core::Core, error::Error, meta::MetricType};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").unwrap());

#[derive(Debug, Deserialize, ToSchema)]
pub struct MetricSampleWire {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum MetricsIngestRequest {
    Batch { metrics: Vec<MetricSampleWire> },
    Single(MetricSampleWire),
}

impl MetricsIngestRequest {
    fn into_samples(self) -> Vec<MetricSampleWire> {
        match self {
            MetricsIngestRequest::Batch { metrics } => metrics,
            MetricsIngestRequest::Single(sample) => vec![sample],
        }
    }
}

fn validate(sample: &MetricSampleWire) -> Result<(), Error> {
    if !NAME_RE.is_match(&sample.name) {
        return Err(Error::Validation(format!("invalid metric name: {}", sample.name)));
    }
    if !sample.value.is_finite() {
        return Err(Error::Validation(format!("metric value is not finite: {}", sample.value)));
    }
    Ok(())
}

fn sample_fields(sample: &MetricSampleWire, source_ip: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("metric_name".into(), sample.name.clone());
    fields.insert("metric_type".into(), sample.metric_type.to_string());
    fields.insert("metric_value".into(), sample.value.to_string());
    fields.insert("labels".into(), serde_json::to_string(&sample.labels).unwrap_or_default());
    fields.insert("timestamp".into(), sample.timestamp.unwrap_or_else(Utc::now).to_rfc3339());
    fields.insert("source_ip".into(), source_ip.to_string());
    if let Some(source) = &sample.source {
        fields.insert("source".into(), source.clone());
    }
    fields
}

/// Accepts one sample or `{metrics:[...]}` (spec §6).
#[utoipa::path(
    post,
    path = "/api/v1/metrics",
    request_body = MetricsIngestRequest,
    responses(
        (status = 200, description = "all samples appended"),
        (status = 400, description = "invalid name, non-finite value, or malformed body"),
        (status = 401, description = "missing or invalid credentials"),
        (status = 503, description = "stream bus append failed"),
    ),
    tag = "metrics"
)]
pub async fn ingest(
    State(core): State<Arc<Core>>,
    Extension(_auth): Extension<AuthContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<MetricsIngestRequest>,
) -> Response {
    let samples = req.into_samples();
    if samples.is_empty() {
        return Error::Validation("at least one metric sample is required".into()).into_response();
    }
    for sample in &samples {
        if let Err(e) = validate(sample) {
            return e.into_response();
        }
    }

    let source_ip = peer.ip().to_string();
    let mut processed = 0u32;
    for sample in &samples {
        let fields = sample_fields(sample, &source_ip);
        match core.stream_bus.append("metrics:raw", fields).await {
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

    fn sample(name: &str, value: f64) -> MetricSampleWire {
        MetricSampleWire {
            name: name.to_string(),
            metric_type: MetricType::Counter,
            value,
            labels: BTreeMap::new(),
            timestamp: None,
            source: None,
        }
    }

    #[test]
    fn valid_name_patterns_accepted() {
        assert!(validate(&sample("http_requests_total", 1.0)).is_ok());
        assert!(validate(&sample("killkrill:logs:received", 1.0)).is_ok());
    }

    #[test]
    fn invalid_name_patterns_rejected() {
        assert!(validate(&sample("1_starts_with_digit", 1.0)).is_err());
        assert!(validate(&sample("has space", 1.0)).is_err());
    }

    #[test]
    fn non_finite_value_rejected() {
        assert!(validate(&sample("x", f64::NAN)).is_err());
        assert!(validate(&sample("x", f64::INFINITY)).is_err());
    }

    #[test]
    fn single_and_batch_forms_both_parse() {
        let single: MetricsIngestRequest = serde_json::from_str(r#"{"name":"x","type":"gauge","value":1.0}"#).unwrap();
        assert_eq!(single.into_samples().len(), 1);

        let batch: MetricsIngestRequest =
            serde_json::from_str(r#"{"metrics":[{"name":"x","type":"gauge","value":1.0}]}"#).unwrap();
        assert_eq!(batch.into_samples().len(), 1);
    }
}
