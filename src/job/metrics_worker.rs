// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Drains `metrics:raw` into the Prometheus push gateway (spec §4.6):
//! grouped by `(source, metric_type)`, formatted as text exposition,
//! pushed as one body per group, acked only on a 2xx response for that
//! group. Secondary sinks are best-effort and do not gate the ack.

use std::{collections::BTreeMap, sync::Arc};

use infra::{sinks::MetricSink, stream_bus::StreamEntry};
use tracing::warn;

use crate::{core::Core, metrics::METRICS};

const STREAM: &str = "metrics:raw";
const GROUP: &str = "prometheus-writers";

struct Sample {
    name: String,
    metric_type: String,
    value: String,
    labels: BTreeMap<String, String>,
}

fn parse_sample(fields: &BTreeMap<String, String>) -> Option<(String, Sample)> {
    let name = fields.get("metric_name")?.clone();
    let metric_type = fields.get("metric_type").cloned().unwrap_or_else(|| "gauge".into());
    let value = fields.get("metric_value")?.clone();
    let source = fields.get("source").cloned().unwrap_or_default();
    let labels = fields
        .get("labels")
        .and_then(|raw| serde_json::from_str::<BTreeMap<String, String>>(raw).ok())
        .unwrap_or_default();
    Some((source.clone(), Sample { name, metric_type, value, labels }))
}

/// Formats one push body in Prometheus text exposition format: one
/// `# HELP`/`# TYPE` pair per distinct metric name, followed by its
/// samples with lexicographically sorted labels.
fn format_body(samples: &[&Sample]) -> String {
    let mut by_name: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        by_name.entry(&sample.name).or_default().push(sample);
    }

    let mut body = String::new();
    for (name, group) in by_name {
        let metric_type = group.first().map(|s| s.metric_type.as_str()).unwrap_or("gauge");
        body.push_str(&format!("# HELP {name} forwarded by killkrill\n"));
        body.push_str(&format!("# TYPE {name} {metric_type}\n"));
        for sample in group {
            if sample.labels.is_empty() {
                body.push_str(&format!("{name} {}\n", sample.value));
            } else {
                let pairs: Vec<String> = sample
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}=\"{}\"", v.replace('"', "\\\"")))
                    .collect();
                body.push_str(&format!("{name}{{{}}} {}\n", pairs.join(","), sample.value));
            }
        }
    }
    body
}

async fn run_sinks(sinks: &[Arc<dyn MetricSink>], samples: &[&Sample]) {
    for sink in sinks {
        for sample in samples {
            let sink_sample = infra::sinks::SinkSample {
                name: sample.name.clone(),
                metric_type: sample.metric_type.clone(),
                value: sample.value.parse().unwrap_or(0.0),
            };
            sink.add_metric(&sink_sample).await;
        }
    }
}

/// Runs until `shutdown` fires.
pub async fn run(
    core: Arc<Core>,
    consumer: String,
    batch: usize,
    sinks: Vec<Arc<dyn MetricSink>>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    if let Err(err) = core.stream_bus.create_group(STREAM, GROUP, "0").await {
        warn!(%err, "failed to create prometheus-writers consumer group");
    }

    let count = batch.min(500);

    loop {
        if *shutdown.borrow() {
            return;
        }

        let entries: Vec<StreamEntry> = tokio::select! {
            res = core.stream_bus.read_group(STREAM, GROUP, &consumer, count, 1000) => match res {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, "metrics worker read_group failed");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    continue;
                }
            },
            _ = shutdown.changed() => continue,
        };

        if entries.is_empty() {
            continue;
        }

        // (source, metric_type) -> [(entry_id, Sample)]
        let mut groups: BTreeMap<(String, String), Vec<(&str, Sample)>> = BTreeMap::new();
        let mut unparseable: Vec<String> = Vec::new();
        for entry in &entries {
            match parse_sample(&entry.fields) {
                Some((source, sample)) => {
                    groups.entry((source, sample.metric_type.clone())).or_default().push((&entry.id, sample));
                }
                None => unparseable.push(entry.id.clone()),
            }
        }

        // Poisonous-record policy (spec §7): a sample missing required
        // fields can never be forwarded, so ack it immediately instead of
        // leaving it pending forever — this worker has no claim-based
        // recovery path to fall back on.
        if !unparseable.is_empty() {
            METRICS.metrics_forwarded_total.with_label_values(&["dropped"]).inc_by(unparseable.len() as u64);
            if let Err(err) = core.stream_bus.ack(STREAM, GROUP, &unparseable).await {
                warn!(%err, "failed to ack unparseable metric entries");
            }
        }

        for ((_source, _metric_type), members) in groups {
            let samples: Vec<&Sample> = members.iter().map(|(_, s)| s).collect();
            run_sinks(&sinks, &samples).await;

            let body = format_body(&samples);
            match core.push_gateway.push(body).await {
                Ok(()) => {
                    let ids: Vec<String> = members.iter().map(|(id, _)| id.to_string()).collect();
                    METRICS.metrics_forwarded_total.with_label_values(&["success"]).inc_by(ids.len() as u64);
                    if let Err(err) = core.stream_bus.ack(STREAM, GROUP, &ids).await {
                        warn!(%err, "failed to ack metric entries");
                    }
                }
                Err(err) => {
                    METRICS.metrics_forwarded_total.with_label_values(&["failed"]).inc_by(members.len() as u64);
                    warn!(%err, "push gateway rejected group, entries remain pending");
                }
            }
        }
    }
}
