// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Coarse-grained CIDR filtering of peers before any payload is parsed
//! (spec §4.1). Rules are held behind an `ArcSwap` snapshot, the same
//! copy-on-write primitive the rest of the workspace uses for hot-reloaded
//! configuration — readers mid-flight never observe a torn update.

use std::{collections::HashMap, net::IpAddr, sync::Arc};

use arc_swap::ArcSwap;
use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct SourceRule {
    pub source_id: String,
    pub networks: Vec<IpNet>,
}

#[derive(Debug, Clone, Default)]
pub struct AdmissionSnapshot {
    by_port: HashMap<u16, SourceRule>,
}

impl AdmissionSnapshot {
    pub fn new(by_port: HashMap<u16, SourceRule>) -> Self {
        Self { by_port }
    }

    /// Rebuilds a snapshot from the current `LogSource` registry: only
    /// sources with both a `syslog_port` and a non-empty, parseable CIDR
    /// list get an entry — sources without a dedicated port have nothing
    /// for a UDP listener to key on (spec §4.1).
    pub fn from_sources(sources: &[crate::meta::LogSource]) -> Self {
        let mut by_port = HashMap::new();
        for source in sources {
            let Some(port) = source.syslog_port else { continue };
            let networks: Vec<IpNet> = source.allowed_cidrs.iter().filter_map(|c| c.parse().ok()).collect();
            if networks.is_empty() {
                continue;
            }
            by_port.insert(
                port,
                SourceRule {
                    source_id: source.id.to_string(),
                    networks,
                },
            );
        }
        Self { by_port }
    }
}

pub struct AdmissionFilter {
    snapshot: ArcSwap<AdmissionSnapshot>,
}

impl Default for AdmissionFilter {
    fn default() -> Self {
        Self::new(AdmissionSnapshot::default())
    }
}

impl AdmissionFilter {
    pub fn new(initial: AdmissionSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from(Arc::new(initial)),
        }
    }

    /// Admits `peer_ip` on `port` if a rule exists for that port and the
    /// peer falls within one of its networks. No rule for the port means
    /// no source is bound there — the datagram is dropped, uncounted
    /// beyond the receiver's own drop counter.
    pub fn check(&self, peer_ip: IpAddr, port: u16) -> bool {
        let snapshot = self.snapshot.load();
        match snapshot.by_port.get(&port) {
            Some(rule) => rule.networks.iter().any(|net| net.contains(&peer_ip)),
            None => false,
        }
    }

    /// Atomically swaps in a new rule set. In-flight `check()` calls see
    /// either the full old snapshot or the full new one, never a mix.
    pub fn reload(&self, new_rules: AdmissionSnapshot) {
        self.snapshot.store(Arc::new(new_rules));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(source_id: &str, cidrs: &[&str]) -> SourceRule {
        SourceRule {
            source_id: source_id.to_string(),
            networks: cidrs.iter().map(|c| c.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn unbound_port_denies() {
        let filter = AdmissionFilter::default();
        assert!(!filter.check("10.0.0.1".parse().unwrap(), 5514));
    }

    #[test]
    fn cidr_allow_and_deny() {
        let mut by_port = HashMap::new();
        by_port.insert(5514, rule("src-a", &["10.0.0.0/24"]));
        let filter = AdmissionFilter::new(AdmissionSnapshot::new(by_port));

        assert!(filter.check("10.0.0.42".parse().unwrap(), 5514));
        assert!(!filter.check("10.0.1.42".parse().unwrap(), 5514));
    }

    #[test]
    fn from_sources_skips_ports_without_a_parseable_allowlist() {
        use crate::meta::{LogFormat, LogSource};
        use chrono::Utc;

        let with_cidr = LogSource {
            id: uuid::Uuid::nil(),
            name: "s1".into(),
            application: "a".into(),
            api_key_hash: "h".into(),
            format_hint: LogFormat::Rfc3164,
            syslog_port: Some(5514),
            allowed_cidrs: vec!["10.0.0.0/8".into()],
            enabled: true,
            created_at: Utc::now(),
        };
        let mut without_cidr = with_cidr.clone();
        without_cidr.name = "s2".into();
        without_cidr.syslog_port = Some(5515);
        without_cidr.allowed_cidrs = vec![];

        let snapshot = AdmissionSnapshot::from_sources(&[with_cidr, without_cidr]);
        let filter = AdmissionFilter::new(snapshot);
        assert!(filter.check("10.0.0.1".parse().unwrap(), 5514));
        assert!(!filter.check("10.0.0.1".parse().unwrap(), 5515));
    }

    #[test]
    fn reload_is_atomic_from_the_readers_perspective() {
        let filter = AdmissionFilter::default();
        assert!(!filter.check("10.0.0.1".parse().unwrap(), 5514));

        let mut by_port = HashMap::new();
        by_port.insert(5514, rule("src-a", &["10.0.0.0/24"]));
        filter.reload(AdmissionSnapshot::new(by_port));

        assert!(filter.check("10.0.0.1".parse().unwrap(), 5514));
    }
}
