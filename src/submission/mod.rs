// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Authenticated Submission Client (spec §4.7) — used by receivers to
//! forward a normalized copy of what they just ingested to an upstream
//! backend. Login/refresh produce a `Token`; transport selection prefers
//! a binary RPC channel and falls back to HTTP on handshake failure;
//! submission retries with exponential backoff and flips the transport to
//! HTTP after an RPC failure.

pub mod http_transport;
pub mod rpc;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    meta::{LogRecord, MetricSample, Token},
};
use http_transport::HttpTransport;
use rpc::RpcTransport;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub struct SubmissionClient {
    http: reqwest::Client,
    api_url: String,
    rpc_url: String,
    client_id: String,
    client_secret: String,
    max_retries: u32,
    retry_backoff: Duration,
    token: Mutex<Option<Token>>,
    use_rpc: AtomicBool,
    rpc: Mutex<Option<RpcTransport>>,
    http_transport: HttpTransport,
}

impl SubmissionClient {
    pub fn new(
        api_url: impl Into<String>,
        rpc_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        max_retries: u32,
        retry_backoff_ms: u64,
    ) -> Self {
        let api_url = api_url.into();
        Self {
            http: reqwest::Client::new(),
            http_transport: HttpTransport::new(api_url.clone()),
            api_url,
            rpc_url: rpc_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            max_retries,
            retry_backoff: Duration::from_millis(retry_backoff_ms),
            token: Mutex::new(None),
            use_rpc: AtomicBool::new(true),
            rpc: Mutex::new(None),
        }
    }

    /// True once a successful RPC handshake has been replaced by a
    /// fallback to HTTP (spec §4.7 seed scenario 6).
    pub fn is_using_rpc(&self) -> bool {
        self.use_rpc.load(Ordering::SeqCst)
    }

    /// POST `/auth/login`; on success stores the token and attempts to
    /// open the preferred RPC transport.
    pub async fn login(&self) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/auth/login", self.api_url))
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Authentication(format!("login rejected: {}", resp.status())));
        }

        let body: LoginResponse = resp.json().await?;
        *self.token.lock() = Some(Token {
            access: body.access_token,
            refresh: body.refresh_token,
            not_after: Utc::now() + chrono::Duration::seconds(body.expires_in),
        });

        self.initialize_transport().await;
        Ok(())
    }

    /// First attempts a binary RPC handshake (5s timeout, inside
    /// `RpcTransport::connect`); on any failure falls back to HTTP.
    async fn initialize_transport(&self) {
        if !self.rpc_url.is_empty() {
            if let Some(transport) = RpcTransport::connect(&self.rpc_url).await {
                *self.rpc.lock() = Some(transport);
                self.use_rpc.store(true, Ordering::SeqCst);
                info!("submission transport selected: rpc");
                return;
            }
        }
        *self.rpc.lock() = None;
        self.use_rpc.store(false, Ordering::SeqCst);
        info!("submission transport selected: http (rpc unavailable)");
    }

    /// POST `/auth/refresh`; on any non-200, falls all the way back to a
    /// fresh `login()` (spec §4.7).
    pub async fn refresh(&self) -> Result<()> {
        let refresh_token = {
            let guard = self.token.lock();
            match guard.as_ref() {
                Some(t) => t.refresh.clone(),
                None => return self.login().await,
            }
        };

        let resp = self
            .http
            .post(format!("{}/auth/refresh", self.api_url))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("token refresh rejected, falling back to full login");
            return self.login().await;
        }

        let body: RefreshResponse = resp.json().await?;
        if let Some(token) = self.token.lock().as_mut() {
            token.access = body.access_token;
            token.not_after = Utc::now() + chrono::Duration::seconds(body.expires_in);
        }
        Ok(())
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        let needs_login = self.token.lock().is_none();
        if needs_login {
            return self.login().await;
        }
        let expired = self.token.lock().as_ref().is_some_and(Token::is_expired);
        if expired {
            self.refresh().await?;
        }
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.token.lock().as_ref().map(|t| t.access.clone())
    }

    /// Submits `logs`, preferring RPC and falling back to HTTP on
    /// failure, retrying up to `max_retries` times with `backoff * 2^n`
    /// delay between attempts (spec §4.7). `cancel` is polled between
    /// attempts so an in-flight submission can be abandoned by the caller
    /// without invalidating the token store.
    pub async fn submit_logs(&self, logs: &[LogRecord], cancel: &tokio::sync::watch::Receiver<bool>) -> Result<bool> {
        let mut backoff = self.retry_backoff;
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            if *cancel.borrow() {
                return Err(Error::Timeout("submit_logs cancelled by caller".into()));
            }

            match self.attempt_submit_logs(logs).await {
                Ok(accepted) => return Ok(accepted),
                Err(e) => {
                    warn!(attempt, error = %e, "submit_logs attempt failed");
                    last_err = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(Error::Resource(format!(
            "submit_logs failed after {} retries: {}",
            self.max_retries,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn attempt_submit_logs(&self, logs: &[LogRecord]) -> Result<bool> {
        self.ensure_authenticated().await?;
        let token = self
            .access_token()
            .ok_or_else(|| Error::Authentication("no token after ensure_authenticated".into()))?;

        if self.use_rpc.load(Ordering::SeqCst) {
            let rpc = self.rpc.lock().take();
            if let Some(rpc) = rpc {
                let payload: Result<Vec<String>> = logs.iter().map(|l| serde_json::to_string(l).map_err(Error::from)).collect();
                let result = rpc.submit_logs(&token, payload?).await;
                *self.rpc.lock() = Some(rpc);
                match result {
                    Ok(resp) => return Ok(resp.accepted),
                    Err(e) => {
                        warn!(error = %e, "rpc submit_logs failed, falling back to http");
                        self.use_rpc.store(false, Ordering::SeqCst);
                    }
                }
            }
        }

        let body = json!({ "logs": logs });
        self.http_transport.submit_logs(&token, &body).await
    }

    pub async fn submit_metrics(&self, metrics: &[MetricSample], cancel: &tokio::sync::watch::Receiver<bool>) -> Result<bool> {
        let mut backoff = self.retry_backoff;
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            if *cancel.borrow() {
                return Err(Error::Timeout("submit_metrics cancelled by caller".into()));
            }

            match self.attempt_submit_metrics(metrics).await {
                Ok(accepted) => return Ok(accepted),
                Err(e) => {
                    warn!(attempt, error = %e, "submit_metrics attempt failed");
                    last_err = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(Error::Resource(format!(
            "submit_metrics failed after {} retries: {}",
            self.max_retries,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn attempt_submit_metrics(&self, metrics: &[MetricSample]) -> Result<bool> {
        self.ensure_authenticated().await?;
        let token = self
            .access_token()
            .ok_or_else(|| Error::Authentication("no token after ensure_authenticated".into()))?;

        if self.use_rpc.load(Ordering::SeqCst) {
            let rpc = self.rpc.lock().take();
            if let Some(rpc) = rpc {
                let payload: Result<Vec<String>> = metrics.iter().map(|m| serde_json::to_string(m).map_err(Error::from)).collect();
                let result = rpc.submit_metrics(&token, payload?).await;
                *self.rpc.lock() = Some(rpc);
                match result {
                    Ok(resp) => return Ok(resp.accepted),
                    Err(e) => {
                        warn!(error = %e, "rpc submit_metrics failed, falling back to http");
                        self.use_rpc.store(false, Ordering::SeqCst);
                    }
                }
            }
        }

        let body = json!({ "metrics": metrics });
        self.http_transport.submit_metrics(&token, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_client_defaults_to_rpc_preference() {
        let client = SubmissionClient::new("http://api", "http://rpc", "id", "secret", 3, 1000);
        assert!(client.is_using_rpc());
    }

    #[tokio::test]
    async fn initialize_transport_falls_back_when_rpc_url_empty() {
        let client = SubmissionClient::new("http://api", "", "id", "secret", 3, 1000);
        client.initialize_transport().await;
        assert!(!client.is_using_rpc());
    }
}
