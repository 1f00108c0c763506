// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Central configuration for every KillKrill process (receiver, worker, or
//! combined). Loaded once at boot from the environment, held behind an
//! `ArcSwap` so it can be hot-reloaded without restarting in-flight tasks.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dotenv_config::EnvConfig;
use dotenvy::dotenv_override;
use once_cell::sync::Lazy;

static CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from(Arc::new(init())));

/// Returns the current configuration snapshot. Cheap: clones an `Arc`.
pub fn get_config() -> Arc<Config> {
    CONFIG.load().clone()
}

/// Re-reads the environment and atomically swaps in a new configuration
/// snapshot. Readers already holding an `Arc<Config>` keep seeing the old
/// values until they call `get_config()` again.
pub fn refresh_config() -> Result<(), anyhow::Error> {
    CONFIG.store(Arc::new(init()));
    Ok(())
}

fn init() -> Config {
    dotenv_override().ok();
    let mut cfg = Config::init().expect("failed to parse configuration from environment");
    if cfg.processor.workers == 0 {
        cfg.processor.workers = 2;
    }
    if cfg.processor.max_batch_size == 0 {
        cfg.processor.max_batch_size = 1000;
    }
    cfg
}

#[derive(EnvConfig)]
pub struct Config {
    pub db: Db,
    pub redis: Redis,
    pub elasticsearch: Elasticsearch,
    pub prometheus: Prometheus,
    pub license: License,
    pub receiver: Receiver,
    pub processor: Processor,
    pub auth: Auth,
    pub submission: Submission,
}

#[derive(EnvConfig)]
pub struct Db {
    #[env_config(name = "DATABASE_URL", default = "postgres://localhost/killkrill")]
    pub url: String,
}

#[derive(EnvConfig)]
pub struct Redis {
    #[env_config(name = "REDIS_URL", default = "redis://127.0.0.1:6379")]
    pub url: String,
}

#[derive(EnvConfig)]
pub struct Elasticsearch {
    #[env_config(name = "ELASTICSEARCH_HOSTS", default = "http://127.0.0.1:9200")]
    pub hosts: String,
    #[env_config(name = "ELASTICSEARCH_INDEX_PREFIX", default = "killkrill")]
    pub index_prefix: String,
}

#[derive(EnvConfig)]
pub struct Prometheus {
    #[env_config(name = "PROMETHEUS_GATEWAY", default = "http://127.0.0.1:9091")]
    pub gateway: String,
    #[env_config(name = "PROMETHEUS_JOB_NAME", default = "killkrill")]
    pub job_name: String,
}

#[derive(EnvConfig)]
pub struct License {
    #[env_config(name = "LICENSE_KEY", default = "")]
    pub key: String,
    #[env_config(name = "PRODUCT_NAME", default = "killkrill")]
    pub product: String,
    #[env_config(name = "LICENSE_BASE_URL", default = "https://license.penguintech.io")]
    pub base_url: String,
}

#[derive(EnvConfig)]
pub struct Receiver {
    #[env_config(name = "RECEIVER_HTTP_PORT", default = 8080)]
    pub http_port: u16,
    #[env_config(name = "RECEIVER_HTTP_ADDR", default = "0.0.0.0")]
    pub http_addr: String,
    #[env_config(name = "RECEIVER_SYSLOG_PORT_START", default = 5514)]
    pub syslog_port_start: u16,
    #[env_config(name = "RECEIVER_SYSLOG_PORT_END", default = 5564)]
    pub syslog_port_end: u16,
    #[env_config(name = "RECEIVER_UDP_RECV_BUF_BYTES", default = 65536)]
    pub udp_recv_buf_bytes: usize,
}

#[derive(EnvConfig)]
pub struct Processor {
    #[env_config(name = "PROCESSOR_WORKERS", default = 2)]
    pub workers: usize,
    #[env_config(name = "MAX_BATCH_SIZE", default = 1000)]
    pub max_batch_size: usize,
    #[env_config(name = "PROCESSING_TIMEOUT", default = 30)]
    pub processing_timeout_secs: u64,
    #[env_config(name = "PROCESSOR_IDLE_CLAIM_MS", default = 60000)]
    pub idle_claim_ms: u64,
    #[env_config(name = "PROCESSOR_PENDING_CLAIM_BATCH", default = 100)]
    pub pending_claim_batch: usize,
}

#[derive(EnvConfig)]
pub struct Auth {
    #[env_config(name = "JWT_SECRET", default = "")]
    pub jwt_secret: String,
}

#[derive(EnvConfig)]
pub struct Submission {
    #[env_config(name = "SUBMISSION_API_URL", default = "")]
    pub api_url: String,
    #[env_config(name = "SUBMISSION_RPC_URL", default = "")]
    pub rpc_url: String,
    #[env_config(name = "SUBMISSION_CLIENT_ID", default = "")]
    pub client_id: String,
    #[env_config(name = "SUBMISSION_CLIENT_SECRET", default = "")]
    pub client_secret: String,
    #[env_config(name = "SUBMISSION_MAX_RETRIES", default = 3)]
    pub max_retries: u32,
    #[env_config(name = "SUBMISSION_RETRY_BACKOFF_MS", default = 1000)]
    pub retry_backoff_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        // SAFETY: test-only, no concurrent env mutation in this process.
        unsafe {
            std::env::remove_var("PROCESSOR_WORKERS");
            std::env::remove_var("MAX_BATCH_SIZE");
        }
        let cfg = init();
        assert_eq!(cfg.processor.workers, 2);
        assert_eq!(cfg.processor.max_batch_size, 1000);
        assert_eq!(cfg.receiver.syslog_port_start, 5514);
    }
}
