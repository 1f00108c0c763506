// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! KillKrill's ingestion-and-forwarding core: admission control, log/metric
//! receivers, the stream-bus-backed workers that forward to Elasticsearch
//! and Prometheus, the authenticated submission client, and the
//! control-plane surface they share.

pub mod admission;
pub mod auth;
pub mod core;
pub mod ecs;
pub mod error;
pub mod handler;
pub mod job;
pub mod meta;
pub mod metrics;
pub mod submission;
pub mod syslog;

pub use core::Core;
pub use error::{Error, Result};
