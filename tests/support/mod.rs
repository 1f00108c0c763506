// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Shared fixtures for crate-level integration tests: an in-memory
//! `StreamBus` and a `Core` builder that needs neither Postgres, Redis,
//! Elasticsearch, nor a push gateway to exist.

use std::{collections::BTreeMap, sync::{Arc, Mutex}};

use async_trait::async_trait;
use infra::{
    errors::Result,
    license::LicenseClient,
    stream_bus::{PendingEntry, StreamBus, StreamEntry},
};
use killkrill::{admission::AdmissionFilter, core::Core, meta::LogSource};

/// Records every `append` call; `read_group`/`pending_range`/`claim` are
/// unimplemented stubs since the HTTP/UDP receiver paths these tests cover
/// never call them — only the worker loops do.
#[derive(Default)]
pub struct RecordingStreamBus {
    pub appended: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

#[async_trait]
impl StreamBus for RecordingStreamBus {
    async fn append(&self, stream: &str, fields: BTreeMap<String, String>) -> Result<String> {
        let mut guard = self.appended.lock().unwrap();
        let id = format!("{}-0", guard.len());
        guard.push((stream.to_string(), fields));
        Ok(id)
    }

    async fn create_group(&self, _stream: &str, _group: &str, _start: &str) -> Result<()> {
        Ok(())
    }

    async fn read_group(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        _count: usize,
        _block_ms: u64,
    ) -> Result<Vec<StreamEntry>> {
        Ok(Vec::new())
    }

    async fn ack(&self, _stream: &str, _group: &str, entry_ids: &[String]) -> Result<u64> {
        Ok(entry_ids.len() as u64)
    }

    async fn pending_range(&self, _stream: &str, _group: &str) -> Result<Vec<PendingEntry>> {
        Ok(Vec::new())
    }

    async fn claim(
        &self,
        _stream: &str,
        _group: &str,
        _new_consumer: &str,
        _min_idle_ms: u64,
        _entry_ids: &[String],
    ) -> Result<Vec<StreamEntry>> {
        Ok(Vec::new())
    }

    async fn stream_length(&self, stream: &str) -> Result<u64> {
        let guard = self.appended.lock().unwrap();
        Ok(guard.iter().filter(|(s, _)| s == stream).count() as u64)
    }
}

impl RecordingStreamBus {
    pub fn entries_for(&self, stream: &str) -> Vec<BTreeMap<String, String>> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == stream)
            .map(|(_, fields)| fields.clone())
            .collect()
    }
}

/// Builds a `Core` with a `RecordingStreamBus`, the default (empty)
/// admission snapshot, and an unvalidated license client — none of these
/// tests need a license backend to be reachable. `sources` are registered
/// up front, the same way `load_sources_and_sensors` does at boot.
pub fn test_core(sources: Vec<LogSource>) -> (Arc<Core>, Arc<RecordingStreamBus>) {
    let bus = Arc::new(RecordingStreamBus::default());
    let config = config::get_config();
    let license = Arc::new(LicenseClient::new(
        config.license.base_url.clone(),
        config.license.key.clone(),
        config.license.product.clone(),
    ));
    let admission = Arc::new(AdmissionFilter::default());
    let core = Arc::new(Core::new(config, bus.clone(), license, admission));
    for source in sources {
        core.register_source(source);
    }
    (core, bus)
}
