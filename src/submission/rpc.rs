// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Binary RPC transport: the Submission Client's preferred protocol
//! (spec §4.7). Wire messages are plain `prost::Message` structs called
//! through `tonic`'s generic unary client — there is no server-side
//! implementation of this service in this repository (the backend it
//! talks to is an external collaborator per spec.md §1), so no
//! `.proto`/`build.rs` codegen step is needed to exercise the client path.

use std::time::Duration;

use tonic::{client::Grpc, codec::ProstCodec, transport::Channel, Request};

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitLogsRequest {
    #[prost(string, tag = "1")]
    pub access_token: String,
    #[prost(string, repeated, tag = "2")]
    pub logs_json: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitMetricsRequest {
    #[prost(string, tag = "1")]
    pub access_token: String,
    #[prost(string, repeated, tag = "2")]
    pub metrics_json: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitResponse {
    #[prost(bool, tag = "1")]
    pub accepted: bool,
    #[prost(uint32, tag = "2")]
    pub processed: u32,
}

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected, handshake-ready RPC channel. Constructing one is the
/// "initialize transport" half of spec §4.7's login step; failure here is
/// what triggers fallback to HTTP, never a hard error.
pub struct RpcTransport {
    channel: Channel,
}

impl RpcTransport {
    /// Opens `rpc_url` and waits for the channel to become ready, bounded
    /// by a 5s handshake timeout (spec §4.7). Returns `None` rather than
    /// an error on any failure — the caller's job is simply "try RPC, or
    /// don't", not propagate connection diagnostics.
    pub async fn connect(rpc_url: &str) -> Option<Self> {
        let endpoint = Channel::from_shared(rpc_url.to_string()).ok()?;
        let channel = tokio::time::timeout(HANDSHAKE_TIMEOUT, endpoint.connect())
            .await
            .ok()?
            .ok()?;
        let mut grpc = Grpc::new(channel.clone());
        tokio::time::timeout(HANDSHAKE_TIMEOUT, grpc.ready()).await.ok()?.ok()?;
        Some(Self { channel })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, req: Req) -> Result<Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let mut client = Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| Error::Resource(format!("rpc channel not ready: {e}")))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static(path);
        let codec = ProstCodec::<Req, Resp>::default();
        let response = client
            .unary(Request::new(req), path, codec)
            .await
            .map_err(|status| Error::Resource(format!("rpc call failed: {status}")))?;
        Ok(response.into_inner())
    }

    pub async fn submit_logs(&self, access_token: &str, logs_json: Vec<String>) -> Result<SubmitResponse> {
        self.unary(
            "/killkrill.submission.v1.SubmissionService/SubmitLogs",
            SubmitLogsRequest {
                access_token: access_token.to_string(),
                logs_json,
            },
        )
        .await
    }

    pub async fn submit_metrics(&self, access_token: &str, metrics_json: Vec<String>) -> Result<SubmitResponse> {
        self.unary(
            "/killkrill.submission.v1.SubmissionService/SubmitMetrics",
            SubmitMetricsRequest {
                access_token: access_token.to_string(),
                metrics_json,
            },
        )
        .await
    }
}
