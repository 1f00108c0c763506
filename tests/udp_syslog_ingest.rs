// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Seed scenario (spec §8): an RFC3164 datagram sent over loopback UDP to
//! a source's dedicated port is parsed and lands on `logs:raw` with the
//! expected facility/severity/hostname/program fields.

mod support;

use chrono::Utc;
use killkrill::{
    admission::AdmissionSnapshot,
    handler::udp::spawn_listeners,
    meta::LogFormat,
};
use std::time::Duration;
use tokio::net::UdpSocket;
use uuid::Uuid;

const TEST_PORT: u16 = 58514;

#[tokio::test]
async fn rfc3164_datagram_is_parsed_and_appended() {
    let source = killkrill::meta::LogSource {
        id: Uuid::now_v7(),
        name: "syslog-src".into(),
        application: "billing".into(),
        api_key_hash: "unused".into(),
        format_hint: LogFormat::Rfc3164,
        syslog_port: Some(TEST_PORT),
        allowed_cidrs: vec!["127.0.0.1/32".to_string()],
        enabled: true,
        created_at: Utc::now(),
    };

    let (core, bus) = support::test_core(vec![source]);
    core.admission.reload(AdmissionSnapshot::from_sources(&core.all_sources()));

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    spawn_listeners(core.clone(), &core.all_sources(), shutdown_rx);

    // give the listener task a moment to bind before we send.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed", ("127.0.0.1", TEST_PORT))
        .await
        .unwrap();

    let mut entries = Vec::new();
    for _ in 0..50 {
        entries = bus.entries_for("logs:raw");
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(entries.len(), 1, "expected exactly one appended entry");
    assert_eq!(entries[0]["message"], "'su root' failed");
    assert_eq!(entries[0]["facility"], "auth");
    assert_eq!(entries[0]["log_level"], "critical");
    assert_eq!(entries[0]["hostname"], "mymachine");
    assert_eq!(entries[0]["logger_name"], "su");
    assert_eq!(entries[0]["service_name"], "billing");
    assert_eq!(entries[0]["protocol"], "udp");
}

#[tokio::test]
async fn datagram_from_outside_allowlist_is_dropped() {
    let source = killkrill::meta::LogSource {
        id: Uuid::now_v7(),
        name: "syslog-src-2".into(),
        application: "billing".into(),
        api_key_hash: "unused".into(),
        format_hint: LogFormat::Rfc3164,
        syslog_port: Some(TEST_PORT + 1),
        allowed_cidrs: vec!["10.0.0.0/24".to_string()],
        enabled: true,
        created_at: Utc::now(),
    };

    let (core, bus) = support::test_core(vec![source]);
    core.admission.reload(AdmissionSnapshot::from_sources(&core.all_sources()));

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    spawn_listeners(core.clone(), &core.all_sources(), shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<34>Oct 11 22:14:15 mymachine su: denied", ("127.0.0.1", TEST_PORT + 1))
        .await
        .unwrap();

    // loopback (127.0.0.1) is not in the 10.0.0.0/24 allowlist, so nothing
    // should ever show up no matter how long we wait.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(bus.entries_for("logs:raw").is_empty());
}
