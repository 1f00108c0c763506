// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Pluggable secondary metric sinks (spec §4.6: "HDFS, Spark, Bigtable
//! implement the same contract `add_metric(sample) -> bool`; their success
//! is independent of Prometheus success"). The original implementation
//! ships these as unconditional placeholders ("would send metric to
//! HDFS") with no network call behind them; we keep that shape rather
//! than inventing an integration no deployment actually exercises — see
//! DESIGN.md.

use async_trait::async_trait;
use tracing::debug;

/// One metric observation in the shape secondary sinks consume. Kept
/// separate from `killkrill::meta::MetricSample` so `infra` does not
/// depend on the binary crate's data model.
#[derive(Debug, Clone)]
pub struct SinkSample {
    pub name: String,
    pub metric_type: String,
    pub value: f64,
}

#[async_trait]
pub trait MetricSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn add_metric(&self, sample: &SinkSample) -> bool;
}

pub struct HdfsSink {
    url: String,
}

impl HdfsSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl MetricSink for HdfsSink {
    fn name(&self) -> &'static str {
        "hdfs"
    }

    async fn add_metric(&self, sample: &SinkSample) -> bool {
        debug!(url = %self.url, metric = %sample.name, "would send metric to hdfs");
        true
    }
}

pub struct SparkSink {
    url: String,
}

impl SparkSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl MetricSink for SparkSink {
    fn name(&self) -> &'static str {
        "spark"
    }

    async fn add_metric(&self, sample: &SinkSample) -> bool {
        debug!(url = %self.url, metric = %sample.name, "would send metric to spark");
        true
    }
}

pub struct BigtableSink {
    project_id: String,
    instance_id: String,
}

impl BigtableSink {
    pub fn new(project_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

#[async_trait]
impl MetricSink for BigtableSink {
    fn name(&self) -> &'static str {
        "bigtable"
    }

    async fn add_metric(&self, sample: &SinkSample) -> bool {
        debug!(
            project = %self.project_id,
            instance = %self.instance_id,
            metric = %sample.name,
            "would send metric to bigtable"
        );
        true
    }
}
