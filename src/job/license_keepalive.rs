// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Periodic licensing keepalive (spec §4.8): every 60s, reports this
//! process's identity and uptime to the entitlement backend. Failures are
//! logged and do not interrupt ingestion — only the boot-time `validate()`
//! call is on the Fatal path.

use std::{collections::HashMap, sync::Arc, time::Instant};

use infra::license::KeepaliveRequest;
use tracing::warn;

use crate::core::Core;

const INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

pub async fn run(core: Arc<Core>, server_id: String, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let started = Instant::now();
    let hostname = hostname_or_unknown();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(INTERVAL) => {}
            _ = shutdown.changed() => if *shutdown.borrow() { return },
        }

        let req = KeepaliveRequest {
            product: &core.config.license.product,
            server_id: &server_id,
            hostname: &hostname,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: started.elapsed().as_secs(),
            usage: HashMap::new(),
        };

        if let Err(err) = core.license.keepalive(&req).await {
            warn!(%err, "license keepalive failed");
        }
    }
}

fn hostname_or_unknown() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
