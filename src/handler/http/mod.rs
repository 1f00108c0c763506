// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! HTTP surface assembly: unauthenticated health/metrics, Multi-Auth-gated
//! ingestion and admin routes, and the sensor routes which authenticate
//! themselves inline rather than through the shared middleware (spec §6).

pub mod admin;
pub mod health;
pub mod logs;
pub mod metrics;
mod openapi;
pub mod sensors;

use std::{sync::Arc, time::Duration};

use axum::{middleware, routing::{get, post}, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{auth, core::Core};

/// Builds the full application router. Callers pair this with
/// `axum::serve(..).into_make_service_with_connect_info::<SocketAddr>()`
/// so handlers can extract `ConnectInfo<SocketAddr>` for admission checks.
pub fn router(core: Arc<Core>) -> Router {
    let cors = CorsLayer::permissive();
    let processing_timeout = Duration::from_secs(core.config.processor.processing_timeout_secs);

    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics));

    let ingest = Router::new()
        .route("/api/v1/logs", post(logs::ingest))
        .route("/api/v1/metrics", post(metrics::ingest))
        .route("/admin/admission/reload", post(admin::reload_admission))
        .route_layer(middleware::from_fn_with_state(core.clone(), auth::require_auth));

    let sensors = Router::new()
        .route("/sensors/{agent_id}/heartbeat", post(sensors::heartbeat))
        .route("/sensors/config/{agent_id}", get(sensors::config))
        .route("/sensors/results", post(sensors::results));

    let docs = SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", openapi::ApiDoc::openapi());

    Router::new()
        .merge(public)
        .merge(ingest)
        .merge(sensors)
        .merge(docs)
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::timeout::TimeoutLayer::new(processing_timeout))
        .layer(cors)
        .with_state(core)
}
