// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Thin client over an Elasticsearch-compatible `_bulk` endpoint. Document
//! shape and index naming are the Log Worker's concern (spec §4.5); this
//! client only knows how to ship an NDJSON bulk body and parse per-item
//! results back out.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{Error, Result};

/// One document to index, already shaped and named by the caller.
#[derive(Debug, Clone)]
pub struct BulkDoc {
    pub index: String,
    pub id: String,
    pub source: Value,
}

/// Per-document outcome of a bulk request, keyed by the document id the
/// caller supplied (which is itself derived from the stream entry id —
/// see spec §4.5 point 4 — so the caller can map back to entries to ack).
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    pub id: String,
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
struct BulkResponseBody {
    items: Vec<BulkResponseItem>,
}

#[derive(Debug, Deserialize)]
struct BulkResponseItem {
    #[serde(alias = "index", alias = "create")]
    index: BulkItemAction,
}

#[derive(Debug, Deserialize)]
struct BulkItemAction {
    #[serde(rename = "_id")]
    id: String,
    status: u16,
}

pub struct SearchIndexClient {
    http: reqwest::Client,
    /// First reachable host wins; the original Python client fans a single
    /// request out across a host list, we keep the first entry since the
    /// ingestion core never needs cluster-aware routing.
    base_url: String,
}

impl SearchIndexClient {
    pub fn new(hosts_csv: &str) -> Self {
        let base_url = hosts_csv
            .split(',')
            .next()
            .unwrap_or(hosts_csv)
            .trim()
            .trim_end_matches('/')
            .to_string();
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build elasticsearch http client"),
            base_url,
        }
    }

    pub async fn ping(&self) -> bool {
        self.http
            .get(&self.base_url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Ships `docs` as one `_bulk` request. Retries up to `max_retries`
    /// times with exponential backoff (2s, 4s, 8s, ... capped at 600s) on
    /// transient failures (network error, 5xx); a response that merely
    /// contains per-item failures is not retried — the caller acks only the
    /// ids reported successful, and unacked entries are redelivered later by
    /// the stream bus.
    pub async fn bulk_index(&self, docs: &[BulkDoc], max_retries: u32) -> Result<Vec<BulkItemResult>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = String::new();
        for doc in docs {
            body.push_str(&serde_json::to_string(&serde_json::json!({
                "index": { "_index": doc.index, "_id": doc.id }
            }))?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&doc.source)?);
            body.push('\n');
        }

        let mut attempt = 0u32;
        let mut backoff = Duration::from_secs(2);
        loop {
            let result = self
                .http
                .post(format!("{}/_bulk", self.base_url))
                .header("content-type", "application/x-ndjson")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: BulkResponseBody = resp.json().await?;
                    return Ok(parsed
                        .items
                        .into_iter()
                        .map(|item| BulkItemResult {
                            id: item.index.id,
                            ok: item.index.status < 300,
                        })
                        .collect());
                }
                Ok(resp) if attempt >= max_retries => {
                    return Err(Error::Resource(format!(
                        "elasticsearch bulk write failed: {}",
                        resp.status()
                    )));
                }
                Err(e) if attempt >= max_retries => return Err(Error::from(e)),
                _ => {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(600));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_takes_first_host_and_trims_slash() {
        let client = SearchIndexClient::new("http://es1:9200/, http://es2:9200/");
        assert_eq!(client.base_url, "http://es1:9200");
    }
}
