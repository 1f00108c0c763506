// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Process entrypoint. Boots the shared `Core`, then spawns the subset of
//! receivers/workers selected by `--role` (default: all of them, since
//! spec.md §9's "two overlapping HTTP frameworks" collapse into one
//! process here and there is no architectural reason to split them unless
//! an operator wants to scale ingestion and forwarding independently).
//! Exit codes follow spec §6: 0 normal, 1 fatal init.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use killkrill::{admission::AdmissionFilter, core::Core, handler, job};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    All,
    Receiver,
    Worker,
}

fn parse_args() -> Role {
    let matches = clap::Command::new("killkrill")
        .version(env!("CARGO_PKG_VERSION"))
        .about(clap::crate_description!())
        .arg(
            clap::Arg::new("role")
                .long("role")
                .value_parser(clap::builder::PossibleValuesParser::new(["all", "receiver", "worker"]))
                .default_value("all")
                .help("which part of the core to run in this process"),
        )
        .get_matches();

    match matches.get_one::<String>("role").map(String::as_str) {
        Some("receiver") => Role::Receiver,
        Some("worker") => Role::Worker,
        _ => Role::All,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "killkrill=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let role = parse_args();
    tracing::info!(?role, version = env!("CARGO_PKG_VERSION"), "starting killkrill");

    if let Err(err) = run(role).await {
        tracing::error!(%err, "fatal error during startup");
        std::process::exit(1);
    }
}

async fn run(role: Role) -> anyhow::Result<()> {
    let config = config::get_config();

    // Fatal path (spec §6/§7): required infrastructure must be reachable
    // at boot, and the license must be valid, or the process does not
    // start.
    infra::db::init(&config.db.url).await.map_err(|e| anyhow::anyhow!("database unreachable: {e}"))?;

    let stream_bus = Arc::new(
        infra::stream_bus::redis_streams::RedisStreamBus::connect(&config.redis.url)
            .await
            .map_err(|e| anyhow::anyhow!("redis stream bus unreachable: {e}"))?,
    );

    let license = Arc::new(infra::license::LicenseClient::new(
        config.license.base_url.clone(),
        config.license.key.clone(),
        config.license.product.clone(),
    ));
    if !config.license.key.is_empty() {
        license.validate().await.map_err(|e| anyhow::anyhow!("license validation failed: {e}"))?;
    } else {
        tracing::warn!("LICENSE_KEY not set, skipping boot-time license validation");
    }

    if matches!(role, Role::All | Role::Worker) {
        let search = infra::search::SearchIndexClient::new(&config.elasticsearch.hosts);
        if !search.ping().await {
            return Err(anyhow::anyhow!("elasticsearch unreachable at {}", config.elasticsearch.hosts));
        }
    }

    let admission = Arc::new(AdmissionFilter::default());
    let core = Arc::new(Core::new(config.clone(), stream_bus, license, admission));

    if matches!(role, Role::All | Role::Receiver) {
        load_sources_and_sensors(&core).await?;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut tasks = Vec::new();

    if matches!(role, Role::All | Role::Receiver) {
        handler::udp::spawn_listeners(core.clone(), &core.all_sources(), shutdown_rx.clone());
    }

    if matches!(role, Role::All | Role::Worker) {
        let max_batch = config.processor.max_batch_size;
        for i in 0..config.processor.workers {
            let core = core.clone();
            let shutdown_rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                job::log_worker::run(core, format!("elk-writer-{i}"), max_batch, shutdown_rx).await;
            }));
        }
        for i in 0..config.processor.workers {
            let core = core.clone();
            let shutdown_rx = shutdown_rx.clone();
            let sinks: Vec<Arc<dyn infra::sinks::MetricSink>> = Vec::new();
            tasks.push(tokio::spawn(async move {
                job::metrics_worker::run(core, format!("prometheus-writer-{i}"), max_batch, sinks, shutdown_rx).await;
            }));
        }
    }

    if !config.license.key.is_empty() {
        let core = core.clone();
        let shutdown_rx = shutdown_rx.clone();
        let server_id = uuid::Uuid::now_v7().to_string();
        tasks.push(tokio::spawn(async move {
            job::license_keepalive::run(core, server_id, shutdown_rx).await;
        }));
    }

    let http_task = if matches!(role, Role::All | Role::Receiver) {
        let app = handler::http::router(core.clone());
        let addr: SocketAddr = format!("{}:{}", config.receiver.http_addr, config.receiver.http_port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "http server listening");
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
        }))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    let drain = async {
        if let Some(http_task) = http_task {
            let _ = http_task.await;
        }
        for task in tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        tracing::warn!("graceful shutdown exceeded 30s, forcing exit");
    }

    Ok(())
}

/// Loads enabled `LogSource`s and `SensorAgent`s into `Core`'s registries
/// and builds the initial Admission Filter snapshot from them (spec §4.1,
/// §4.2) — the same reload path `POST /admin/admission/reload` exercises
/// later.
async fn load_sources_and_sensors(core: &Arc<Core>) -> anyhow::Result<()> {
    use killkrill::{admission::AdmissionSnapshot, meta::LogFormat};
    use sqlx::Row;

    let rows = sqlx::query(
        "SELECT id, name, application, api_key_hash, format_hint, syslog_port, allowed_cidrs, enabled, created_at FROM log_sources WHERE enabled = true",
    )
    .fetch_all(infra::db::pool())
    .await?;

    let mut sources = Vec::with_capacity(rows.len());
    for row in rows {
        let format_raw: String = row.try_get("format_hint")?;
        let syslog_port: Option<i32> = row.try_get("syslog_port")?;
        sources.push(killkrill::meta::LogSource {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            application: row.try_get("application")?,
            api_key_hash: row.try_get("api_key_hash")?,
            format_hint: format_raw.parse::<LogFormat>().unwrap_or(LogFormat::Rfc3164),
            syslog_port: syslog_port.map(|p| p as u16),
            allowed_cidrs: row.try_get("allowed_cidrs")?,
            enabled: row.try_get("enabled")?,
            created_at: row.try_get("created_at")?,
        });
    }

    for source in &sources {
        core.register_source(source.clone());
    }
    core.admission.reload(AdmissionSnapshot::from_sources(&sources));
    tracing::info!(count = sources.len(), "loaded log sources");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
