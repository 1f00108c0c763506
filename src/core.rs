// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Replaces the module-level singletons (implicit init-on-first-use for
//! the database, the stream bus, the license gate) with a single struct
//! constructed once at boot and handed to receivers and workers as an
//! `Arc` (spec.md §9 redesign flag).

use std::sync::Arc;

use config::Config;
use dashmap::DashMap;
use infra::{license::LicenseClient, push_gateway::PushGatewayClient, search::SearchIndexClient, stream_bus::StreamBus};
use uuid::Uuid;

use crate::{
    admission::AdmissionFilter,
    meta::{Check, LogSource, SensorAgent},
};

pub struct Core {
    pub config: Arc<Config>,
    pub stream_bus: Arc<dyn StreamBus>,
    pub license: Arc<LicenseClient>,
    pub admission: Arc<AdmissionFilter>,
    pub search: Arc<SearchIndexClient>,
    pub push_gateway: Arc<PushGatewayClient>,
    /// hashed API key -> owning principal name. A small in-memory index
    /// refreshed from `infra::db`; the handler path never touches SQL.
    api_keys: DashMap<String, String>,
    /// Registered log sources by name, mirrored from `infra::db`. The
    /// Admission Filter snapshot and the UDP listener set are both derived
    /// from this registry.
    sources: DashMap<String, LogSource>,
    /// Sensor agents keyed by their hashed API key, for the `/sensors/*`
    /// Multi-Auth-independent key check (spec §6).
    sensor_agents: DashMap<String, SensorAgent>,
    /// Active check set per agent, returned by `GET /sensors/config/{id}`.
    checks: DashMap<Uuid, Vec<Check>>,
}

impl Core {
    pub fn new(config: Arc<Config>, stream_bus: Arc<dyn StreamBus>, license: Arc<LicenseClient>, admission: Arc<AdmissionFilter>) -> Self {
        let search = Arc::new(SearchIndexClient::new(&config.elasticsearch.hosts));
        let push_gateway = Arc::new(PushGatewayClient::new(&config.prometheus.gateway, &config.prometheus.job_name));
        Self {
            config,
            stream_bus,
            license,
            admission,
            search,
            push_gateway,
            api_keys: DashMap::new(),
            sources: DashMap::new(),
            sensor_agents: DashMap::new(),
            checks: DashMap::new(),
        }
    }

    pub fn lookup_api_key_hash(&self, hash: &str) -> Option<String> {
        self.api_keys.get(hash).map(|v| v.clone())
    }

    pub fn insert_api_key(&self, hash: String, owner: String) {
        self.api_keys.insert(hash, owner);
    }

    pub fn revoke_api_key(&self, hash: &str) {
        self.api_keys.remove(hash);
    }

    pub fn register_source(&self, source: LogSource) {
        self.sources.insert(source.name.clone(), source);
    }

    pub fn get_source(&self, name: &str) -> Option<LogSource> {
        self.sources.get(name).map(|s| s.clone())
    }

    pub fn all_sources(&self) -> Vec<LogSource> {
        self.sources.iter().map(|e| e.value().clone()).collect()
    }

    pub fn register_sensor_agent(&self, agent: SensorAgent) {
        self.sensor_agents.insert(agent.api_key_hash.clone(), agent);
    }

    pub fn sensor_agent_by_key_hash(&self, hash: &str) -> Option<SensorAgent> {
        self.sensor_agents.get(hash).map(|a| a.clone())
    }

    pub fn set_checks(&self, agent_id: Uuid, checks: Vec<Check>) {
        self.checks.insert(agent_id, checks);
    }

    pub fn checks_for_agent(&self, agent_id: Uuid) -> Vec<Check> {
        self.checks.get(&agent_id).map(|c| c.clone()).unwrap_or_default()
    }
}
