// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! KillKrill's own operational metrics (spec §10.4 — a Non-goal excludes a
//! *query engine* over stored metrics, not KillKrill's own `/metrics`
//! endpoint). One process-wide `prometheus::Registry`, matching the
//! reference stack's registry-of-named-counters idiom; names are carried
//! forward unchanged from the original implementation's own metric names
//! since operators already depend on them.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    pub registry: Registry,
    pub logs_received_total: IntCounter,
    pub packets_dropped_total: IntCounterVec,
    pub logs_processed_total: IntCounterVec,
    pub metrics_forwarded_total: IntCounterVec,
    pub queue_lag_messages: IntGauge,
    pub active_syslog_servers: IntGauge,
}

fn build() -> Metrics {
    let registry = Registry::new();

    let logs_received_total = IntCounter::new("killkrill_logs_received_total", "Total logs received by the receiver").unwrap();
    let packets_dropped_total =
        IntCounterVec::new(Opts::new("killkrill_packets_dropped_total", "Total packets dropped before processing"), &["reason"]).unwrap();
    let logs_processed_total = IntCounterVec::new(
        Opts::new("killkrill_processor_logs_processed_total", "Total logs processed by the log worker"),
        &["destination", "status"],
    )
    .unwrap();
    let metrics_forwarded_total = IntCounterVec::new(
        Opts::new("killkrill_processor_metrics_forwarded_total", "Total metrics forwarded to Prometheus"),
        &["status"],
    )
    .unwrap();
    let queue_lag_messages =
        IntGauge::new("killkrill_processor_queue_lag_messages", "Pending messages in the stream bus per group").unwrap();
    let active_syslog_servers = IntGauge::new("killkrill_active_syslog_servers", "Number of UDP syslog listeners in Ready state").unwrap();

    registry.register(Box::new(logs_received_total.clone())).unwrap();
    registry.register(Box::new(packets_dropped_total.clone())).unwrap();
    registry.register(Box::new(logs_processed_total.clone())).unwrap();
    registry.register(Box::new(metrics_forwarded_total.clone())).unwrap();
    registry.register(Box::new(queue_lag_messages.clone())).unwrap();
    registry.register(Box::new(active_syslog_servers.clone())).unwrap();

    Metrics {
        registry,
        logs_received_total,
        packets_dropped_total,
        logs_processed_total,
        metrics_forwarded_total,
        queue_lag_messages,
        active_syslog_servers,
    }
}

pub static METRICS: Lazy<Metrics> = Lazy::new(build);

/// Renders the registry in Prometheus text exposition format, served at
/// `GET /metrics` (spec §6).
pub fn encode() -> String {
    let encoder = TextEncoder::new();
    let families = METRICS.registry.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).expect("prometheus text encoding never fails for well-formed registries");
    String::from_utf8(buf).expect("prometheus text encoder always emits utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metric_names() {
        METRICS.logs_received_total.inc();
        let text = encode();
        assert!(text.contains("killkrill_logs_received_total"));
    }
}
