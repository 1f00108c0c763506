// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Typed client over a persistent ordered log with consumer groups. The
//! only implementation today is Redis Streams; callers depend on the
//! `StreamBus` trait, never on `redis` directly, so an alternate backend
//! can be dropped in behind `default()` without touching receivers or
//! workers.

pub mod redis_streams;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::errors::Result;

/// One delivered entry: its id in the stream, and its field map. Binary
/// payloads are base64-encoded into a string field by the caller before
/// `append` — the bus itself only ever carries strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

/// One pending (delivered, not yet acked) entry as reported by
/// `pending_range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: String,
    pub consumer: String,
    pub idle_ms: u64,
    pub deliveries: u64,
}

#[async_trait]
pub trait StreamBus: Send + Sync + 'static {
    /// Appends `fields` to `stream`, returning the newly assigned entry id.
    /// Entry ids are strictly increasing within a stream.
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> Result<String>;

    /// Creates `group` on `stream` if it does not already exist. Idempotent:
    /// calling this on a pre-existing group is a no-op, not an error.
    async fn create_group(&self, stream: &str, group: &str, start: &str) -> Result<()>;

    /// Reads up to `count` entries not yet delivered to `group`, blocking
    /// for up to `block_ms` milliseconds if none are immediately available.
    /// Delivery marks the returned entries pending for `consumer`.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamEntry>>;

    /// Acknowledges `entry_ids`, removing them from `group`'s pending list.
    /// Returns the number actually acked.
    async fn ack(&self, stream: &str, group: &str, entry_ids: &[String]) -> Result<u64>;

    /// Lists pending entries for `group` on `stream`.
    async fn pending_range(&self, stream: &str, group: &str) -> Result<Vec<PendingEntry>>;

    /// Reassigns pending entries idle for at least `min_idle_ms` to
    /// `new_consumer`, returning their current field maps.
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        new_consumer: &str,
        min_idle_ms: u64,
        entry_ids: &[String],
    ) -> Result<Vec<StreamEntry>>;

    /// Total number of entries ever appended to `stream` (does not shrink
    /// on ack; acking only affects a group's pending set).
    async fn stream_length(&self, stream: &str) -> Result<u64>;
}

static DEFAULT: OnceCell<Box<dyn StreamBus>> = OnceCell::const_new();

/// Returns the process-wide stream bus, initializing it from `REDIS_URL` on
/// first use.
pub async fn get_stream_bus() -> &'static Box<dyn StreamBus> {
    DEFAULT.get_or_init(default).await
}

async fn default() -> Box<dyn StreamBus> {
    let cfg = config::get_config();
    Box::new(
        redis_streams::RedisStreamBus::connect(&cfg.redis.url)
            .await
            .expect("failed to connect to Redis stream bus"),
    )
}
