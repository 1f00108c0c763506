// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Background workers that drain the Stream Bus: `logs:raw` into
//! Elasticsearch, `metrics:raw` into the Prometheus push gateway, plus the
//! license keepalive loop. Each is a long-running task spawned from
//! `main` and stopped via a shared shutdown signal (spec §5).

pub mod license_keepalive;
pub mod log_worker;
pub mod metrics_worker;
