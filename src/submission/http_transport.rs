// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! HTTP fallback transport for the Submission Client (spec §4.7) — used
//! whenever the binary RPC channel can't be opened or its handshake times
//! out. Posts the same normalized payload shape the HTTP ingress accepts.

use crate::error::{Error, Result};

pub struct HttpTransport {
    http: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn submit_logs(&self, access_token: &str, body: &serde_json::Value) -> Result<bool> {
        self.post("/api/v1/logs", access_token, body).await
    }

    pub async fn submit_metrics(&self, access_token: &str, body: &serde_json::Value) -> Result<bool> {
        self.post("/api/v1/metrics", access_token, body).await
    }

    async fn post(&self, path: &str, access_token: &str, body: &serde_json::Value) -> Result<bool> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(Error::from)?;
        Ok(resp.status().is_success())
    }
}
