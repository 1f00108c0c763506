// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Drains `logs:raw` into Elasticsearch (spec §4.5): ECS transform, bulk
//! write with retry, ack-only-on-success, plus a pending-claim recovery
//! scan each iteration.

use std::{collections::HashMap, sync::Arc};

use infra::{search::BulkDoc, stream_bus::StreamEntry};
use tracing::warn;

use crate::{core::Core, ecs::build_document, metrics::METRICS};

const STREAM: &str = "logs:raw";
const GROUP: &str = "elk-writers";

/// Runs until `shutdown` fires. `consumer` must be unique among the
/// workers sharing `GROUP` on `STREAM`.
pub async fn run(core: Arc<Core>, consumer: String, batch: usize, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    if let Err(err) = core.stream_bus.create_group(STREAM, GROUP, "0").await {
        warn!(%err, "failed to create elk-writers consumer group");
    }

    let count = batch.min(500);

    loop {
        if *shutdown.borrow() {
            return;
        }

        let entries = tokio::select! {
            res = core.stream_bus.read_group(STREAM, GROUP, &consumer, count, 1000) => match res {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, "log worker read_group failed");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    continue;
                }
            },
            _ = shutdown.changed() => continue,
        };

        if !entries.is_empty() {
            process_and_ack(&core, &entries).await;
        }

        reclaim_pending(&core, &consumer, core.config.processor.idle_claim_ms, core.config.processor.pending_claim_batch).await;
    }
}

/// Transforms, bulk-writes, and acks only the entries Elasticsearch
/// reported success for (spec §4.5 point 6). Shared by freshly read
/// entries and entries reclaimed from another consumer's pending list.
async fn process_and_ack(core: &Arc<Core>, entries: &[StreamEntry]) {
    let index_prefix = &core.config.elasticsearch.index_prefix;
    let mut docs = Vec::with_capacity(entries.len());
    let mut doc_id_to_entry_id = HashMap::with_capacity(entries.len());
    for entry in entries {
        let ecs = build_document(&entry.fields, &entry.id, index_prefix);
        doc_id_to_entry_id.insert(ecs.doc_id.clone(), entry.id.clone());
        docs.push(BulkDoc {
            index: ecs.index_name,
            id: ecs.doc_id,
            source: ecs.body,
        });
    }

    match core.search.bulk_index(&docs, core.config.submission.max_retries).await {
        Ok(results) => {
            let mut acked = Vec::with_capacity(results.len());
            for result in results {
                let status = if result.ok { "success" } else { "failed" };
                METRICS.logs_processed_total.with_label_values(&["elasticsearch", status]).inc();
                if result.ok {
                    if let Some(entry_id) = doc_id_to_entry_id.get(&result.id) {
                        acked.push(entry_id.clone());
                    }
                }
            }
            if !acked.is_empty() {
                if let Err(err) = core.stream_bus.ack(STREAM, GROUP, &acked).await {
                    warn!(%err, "failed to ack log entries");
                }
            }
        }
        Err(err) => {
            warn!(%err, "bulk write to elasticsearch failed, entries remain pending");
        }
    }
}

async fn reclaim_pending(core: &Arc<Core>, consumer: &str, idle_claim_ms: u64, pending_claim_batch: usize) {
    let pending = match core.stream_bus.pending_range(STREAM, GROUP).await {
        Ok(p) => p,
        Err(err) => {
            warn!(%err, "pending_range failed");
            return;
        }
    };

    let idle_ids: Vec<String> = pending
        .into_iter()
        .filter(|p| p.idle_ms >= idle_claim_ms)
        .take(pending_claim_batch)
        .map(|p| p.id)
        .collect();

    if idle_ids.is_empty() {
        return;
    }

    match core.stream_bus.claim(STREAM, GROUP, consumer, idle_claim_ms, &idle_ids).await {
        Ok(claimed) if !claimed.is_empty() => process_and_ack(core, &claimed).await,
        Ok(_) => {}
        Err(err) => warn!(%err, "failed to claim idle pending log entries"),
    }
}
