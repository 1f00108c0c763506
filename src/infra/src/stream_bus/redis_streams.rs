// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::{PendingEntry, StreamBus, StreamEntry};
use crate::errors::{Error, Result};

pub struct RedisStreamBus {
    conn: ConnectionManager,
}

impl RedisStreamBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

fn fields_to_pairs(fields: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

#[async_trait]
impl StreamBus for RedisStreamBus {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> Result<String> {
        let mut conn = self.conn.clone();
        let pairs = fields_to_pairs(&fields);
        let id: String = conn.xadd(stream, "*", &pairs).await?;
        Ok(id)
    }

    async fn create_group(&self, stream: &str, group: &str, start: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg(start)
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let opts = redis::streams::StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms as usize);
        let reply: redis::streams::StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .unwrap_or_default();
        Ok(reply
            .keys
            .into_iter()
            .flat_map(|k| k.ids)
            .map(|id| StreamEntry {
                id: id.id,
                fields: id
                    .map
                    .into_iter()
                    .filter_map(|(k, v)| match v {
                        redis::Value::BulkString(bytes) => {
                            Some((k, String::from_utf8_lossy(&bytes).into_owned()))
                        }
                        redis::Value::SimpleString(s) => Some((k, s)),
                        _ => None,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn ack(&self, stream: &str, group: &str, entry_ids: &[String]) -> Result<u64> {
        if entry_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let n: u64 = conn.xack(stream, group, entry_ids).await?;
        Ok(n)
    }

    async fn pending_range(&self, stream: &str, group: &str) -> Result<Vec<PendingEntry>> {
        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamPendingCountReply = conn
            .xpending_count(stream, group, "-", "+", 100)
            .await
            .unwrap_or(redis::streams::StreamPendingCountReply { ids: Vec::new() });
        Ok(reply
            .ids
            .into_iter()
            .map(|p| PendingEntry {
                id: p.id,
                consumer: p.consumer,
                idle_ms: p.time_elapsed as u64,
                deliveries: p.times_delivered as u64,
            })
            .collect())
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        new_consumer: &str,
        min_idle_ms: u64,
        entry_ids: &[String],
    ) -> Result<Vec<StreamEntry>> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamClaimReply = conn
            .xclaim(stream, group, new_consumer, min_idle_ms as usize, entry_ids)
            .await?;
        Ok(reply
            .ids
            .into_iter()
            .map(|id| StreamEntry {
                id: id.id,
                fields: id
                    .map
                    .into_iter()
                    .filter_map(|(k, v)| match v {
                        redis::Value::BulkString(bytes) => {
                            Some((k, String::from_utf8_lossy(&bytes).into_owned()))
                        }
                        redis::Value::SimpleString(s) => Some((k, s)),
                        _ => None,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn stream_length(&self, stream: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = conn.xlen(stream).await?;
        Ok(n)
    }
}
