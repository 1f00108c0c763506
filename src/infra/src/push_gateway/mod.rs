// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Thin client over a Prometheus push gateway's text-exposition endpoint
//! (spec §4.6). Grouping, formatting, and buffering are the Metrics
//! Worker's concern; this client only knows how to POST a pre-formatted
//! body under a fixed job name and report whether the gateway accepted it.

use std::time::Duration;

use crate::errors::{Error, Result};

pub struct PushGatewayClient {
    http: reqwest::Client,
    gateway_url: String,
    job_name: String,
}

impl PushGatewayClient {
    pub fn new(gateway_url: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build push gateway http client"),
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
            job_name: job_name.into(),
        }
    }

    /// POSTs `body` (already in Prometheus text exposition format) to
    /// `{gateway}/metrics/job/{job_name}`. A 2xx response means every
    /// sample in the push was accepted; anything else means none were —
    /// the gateway's push endpoint is all-or-nothing per request.
    pub async fn push(&self, body: String) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/metrics/job/{}", self.gateway_url, self.job_name))
            .header("content-type", "text/plain; version=0.0.4")
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Resource(format!(
                "prometheus push gateway rejected push: {}",
                resp.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = PushGatewayClient::new("http://gw:9091/", "killkrill-metrics");
        assert_eq!(client.gateway_url, "http://gw:9091");
    }
}
