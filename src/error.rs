// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Crate-wide error type for everything above `infra` — the handler and
//! job layers. Reuses `infra::errors::Error`'s taxonomy (spec §7) and adds
//! the one thing `infra` cannot: mapping to an HTTP response at the
//! boundary, since only request handlers know about status codes.

pub use infra::errors::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, reason) = match &self {
            Error::Admission(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Error::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Resource(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Error::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            Error::Fatal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(json!({ "error": reason }))).into_response()
    }
}
