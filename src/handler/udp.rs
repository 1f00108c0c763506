// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! One UDP listener per enabled source with a `syslog_port` (spec §4.2).
//! Each listener is its own task, cycling through
//! `Unbound -> Binding -> Ready -> (Shutdown|Failed)`; a listener that
//! fails after reaching `Ready` is retried with exponential backoff
//! capped at 30s.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::{core::Core, meta::LogSource, metrics::METRICS, syslog::parse_rfc3164};

const MAX_DATAGRAM: usize = 64 * 1024;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unbound,
    Binding,
    Ready,
    Failed,
}

/// Spawns one listener task per `source`; returns once every task has been
/// spawned (it does not wait for them to bind). Tasks run until `shutdown`
/// fires.
pub fn spawn_listeners(core: Arc<Core>, sources: &[LogSource], shutdown: tokio::sync::watch::Receiver<bool>) {
    for source in sources {
        let Some(port) = source.syslog_port else { continue };
        if !source.enabled {
            continue;
        }
        let core = core.clone();
        let source = source.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_listener(core, source, port, shutdown).await });
    }
}

async fn run_listener(core: Arc<Core>, source: LogSource, port: u16, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut state = State::Unbound;
    let mut backoff = Duration::from_secs(1);
    let mut socket: Option<UdpSocket> = None;
    let recv_buf_bytes = core.config.receiver.udp_recv_buf_bytes.min(MAX_DATAGRAM).max(1);

    loop {
        if *shutdown.borrow() {
            return;
        }

        match state {
            State::Unbound => state = State::Binding,
            State::Binding => {
                let addr: SocketAddr = ([0, 0, 0, 0], port).into();
                match UdpSocket::bind(addr).await {
                    Ok(bound) => {
                        info!(source = %source.name, port, "syslog listener bound");
                        backoff = Duration::from_secs(1);
                        socket = Some(bound);
                        state = State::Ready;
                    }
                    Err(err) => {
                        warn!(source = %source.name, port, %err, "syslog bind failed");
                        state = State::Failed;
                    }
                }
            }
            State::Ready => {
                let bound = socket.take().expect("Ready state always carries a bound socket");
                METRICS.active_syslog_servers.inc();
                let result = serve(&bound, &core, &source, port, recv_buf_bytes, &mut shutdown).await;
                METRICS.active_syslog_servers.dec();
                match result {
                    Ok(()) => return,
                    Err(err) => {
                        warn!(source = %source.name, port, %err, "syslog listener failed");
                        state = State::Failed;
                    }
                }
            }
            State::Failed => {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => if *shutdown.borrow() { return },
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                state = State::Unbound;
            }
        }
    }
}

/// Runs the receive loop until the socket errors (triggering retry) or
/// shutdown is signalled. `Ok(())` on graceful shutdown.
async fn serve(
    socket: &UdpSocket,
    core: &Arc<Core>,
    source: &LogSource,
    port: u16,
    recv_buf_bytes: usize,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; recv_buf_bytes];
    loop {
        let (len, peer) = tokio::select! {
            res = socket.recv_from(&mut buf) => res?,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
                continue;
            }
        };

        let truncated = len >= recv_buf_bytes;
        if truncated {
            METRICS.packets_dropped_total.with_label_values(&["truncated"]).inc();
        }

        if !core.admission.check(peer.ip(), port) {
            METRICS.packets_dropped_total.with_label_values(&["admission"]).inc();
            continue;
        }

        let raw = String::from_utf8_lossy(&buf[..len]);
        let parsed = parse_rfc3164(&raw);

        let mut fields = std::collections::BTreeMap::new();
        fields.insert("message".into(), parsed.message);
        fields.insert("log_level".into(), parsed.severity);
        fields.insert("facility".into(), parsed.facility);
        fields.insert("hostname".into(), parsed.hostname);
        fields.insert("logger_name".into(), parsed.program);
        fields.insert("service_name".into(), source.application.clone());
        fields.insert("ecs_version".into(), "8.0".into());
        fields.insert("source_id".into(), source.id.to_string());
        fields.insert("source_ip".into(), peer.ip().to_string());
        fields.insert("protocol".into(), "udp".into());
        fields.insert("application".into(), source.application.clone());
        fields.insert("timestamp".into(), chrono::Utc::now().to_rfc3339());

        match core.stream_bus.append("logs:raw", fields).await {
            Ok(_) => METRICS.logs_received_total.inc(),
            Err(err) => warn!(source = %source.name, %err, "failed to append syslog entry to stream"),
        }
    }
}
