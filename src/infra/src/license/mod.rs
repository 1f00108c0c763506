// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Client for the PenguinTech-style licensing backend: validates the
//! configured license at boot, answers per-feature entitlement checks with
//! a short cache, and sends a periodic keepalive carrying usage data.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

const CACHE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub limits: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeatureCheckResponse {
    #[serde(default)]
    entitled: bool,
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    product: &'a str,
}

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    product: &'a str,
    feature: &'a str,
}

#[derive(Debug, Serialize)]
pub struct KeepaliveRequest<'a> {
    pub product: &'a str,
    pub server_id: &'a str,
    pub hostname: &'a str,
    pub version: &'a str,
    pub uptime_seconds: u64,
    #[serde(flatten)]
    pub usage: HashMap<String, serde_json::Value>,
}

struct CacheEntry<T> {
    value: T,
    at: Instant,
}

pub struct LicenseClient {
    http: reqwest::Client,
    base_url: String,
    license_key: String,
    product: String,
    validation_cache: Mutex<Option<CacheEntry<ValidationResponse>>>,
    feature_cache: Mutex<HashMap<String, CacheEntry<bool>>>,
}

impl LicenseClient {
    pub fn new(base_url: impl Into<String>, license_key: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            license_key: license_key.into(),
            product: product.into(),
            validation_cache: Mutex::new(None),
            feature_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Validates the license against the backend, or returns the cached
    /// result if it is less than five minutes old.
    pub async fn validate(&self) -> Result<ValidationResponse> {
        if let Some(entry) = self.validation_cache.lock().as_ref() {
            if entry.at.elapsed() < CACHE_TIMEOUT {
                return Ok(entry.value.clone());
            }
        }

        let resp = self
            .http
            .post(format!("{}/api/v2/validate", self.base_url))
            .bearer_auth(&self.license_key)
            .json(&ValidateRequest { product: &self.product })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Fatal(format!(
                "license validation failed: {}",
                resp.status()
            )));
        }

        let body: ValidationResponse = resp.json().await?;
        *self.validation_cache.lock() = Some(CacheEntry {
            value: body.clone(),
            at: Instant::now(),
        });
        Ok(body)
    }

    /// Checks whether `feature` is entitled, using a per-feature cache.
    pub async fn check_feature(&self, feature: &str) -> Result<bool> {
        if let Some(entry) = self.feature_cache.lock().get(feature) {
            if entry.at.elapsed() < CACHE_TIMEOUT {
                return Ok(entry.value);
            }
        }

        let resp = self
            .http
            .post(format!("{}/api/v2/features", self.base_url))
            .bearer_auth(&self.license_key)
            .json(&FeatureRequest {
                product: &self.product,
                feature,
            })
            .send()
            .await?;

        let entitled = if resp.status().is_success() {
            resp.json::<FeatureCheckResponse>().await?.entitled
        } else {
            false
        };

        self.feature_cache.lock().insert(
            feature.to_string(),
            CacheEntry {
                value: entitled,
                at: Instant::now(),
            },
        );
        Ok(entitled)
    }

    /// Sends a keepalive carrying current usage data. Failures here are
    /// logged by the caller and do not interrupt processing — only the
    /// boot-time `validate()` call is on the Fatal path.
    pub async fn keepalive(&self, req: &KeepaliveRequest<'_>) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/api/v2/keepalive", self.base_url))
            .bearer_auth(&self.license_key)
            .json(req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Resource(format!(
                "keepalive rejected: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_considered_fresh_immediately() {
        let entry = CacheEntry {
            value: true,
            at: Instant::now(),
        };
        assert!(entry.at.elapsed() < CACHE_TIMEOUT);
    }
}
