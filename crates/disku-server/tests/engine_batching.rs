mod common;

use chrono::{DateTime, Duration, Utc};
use common::{recording_registry, test_config, GIB};
use disku_common::types::{ClientInfo, Report};
use disku_notify::plugin::ChannelRegistry;
use disku_server::engine::{render_message, ReportEngine};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::seconds(1_000_000 + secs)
}

fn report(machine: &str, used_gib: u64, free_gib: u64) -> Report {
    let mut disk_usage = BTreeMap::new();
    disk_usage.insert(
        "/".to_string(),
        json!({ "total": 100 * GIB, "used": used_gib * GIB, "free": free_gib * GIB }),
    );
    Report {
        client_info: ClientInfo {
            hostname: Some(machine.to_string()),
            ..Default::default()
        },
        disk_usage,
    }
}

#[tokio::test]
async fn batch_is_sent_once_the_window_elapses() {
    let (registry, sent) = recording_registry();
    let engine = ReportEngine::from_config(&test_config(false), registry).unwrap();

    engine.ingest_at(&report("web-01", 96, 4), at(0)).await;
    engine.ingest_at(&report("web-01", 97, 3), at(2)).await;
    engine.ingest_at(&report("db-01", 90, 10), at(5)).await;
    assert_eq!(sent.lock().unwrap().len(), 1);

    engine.ingest_at(&report("cache-01", 0, 100), at(10)).await;

    let sent = sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    // Latest message per machine, machines in name order, blank line between.
    assert_eq!(
        sent[1],
        "cache-01 / FREE == 100G\n\ndb-01 / USED > 10G\n\nweb-01 / FREE < 5G"
    );
    assert_eq!(engine.pending_count().await, 0);
}

#[tokio::test]
async fn pending_alerts_are_not_sent_without_another_report() {
    let (registry, sent) = recording_registry();
    let engine = ReportEngine::from_config(&test_config(false), registry).unwrap();

    engine.ingest_at(&report("web-01", 96, 4), at(0)).await;
    engine.ingest_at(&report("db-01", 96, 4), at(1)).await;

    // Nothing else arrives: the alert for db-01 stays buffered.
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(engine.pending_count().await, 1);

    // Quiet reports do not touch the buffer either.
    engine.ingest_at(&report("web-01", 9, 91), at(60)).await;
    assert_eq!(engine.pending_count().await, 1);
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn periodic_flush_sends_due_alerts() {
    let (registry, sent) = recording_registry();
    let engine = ReportEngine::from_config(&test_config(false), registry).unwrap();

    engine.ingest_at(&report("web-01", 96, 4), at(0)).await;
    engine.ingest_at(&report("db-01", 96, 4), at(1)).await;

    assert!(!engine.flush_due_at(at(9)).await);
    assert!(engine.flush_due_at(at(10)).await);
    assert!(!engine.flush_due_at(at(30)).await);

    let sent = sent.lock().unwrap().clone();
    assert_eq!(sent, vec!["web-01 / FREE < 5G", "db-01 / FREE < 5G"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_flush_once_and_keep_every_alert() {
    let (registry, sent) = recording_registry();
    let engine = Arc::new(ReportEngine::from_config(&test_config(false), registry).unwrap());

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .ingest_at(&report(&format!("host-{i:03}"), 96, 4), at(0))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().len(), 1);
    }

    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(engine.pending_count().await, 199);

    engine.flush_due_at(at(10)).await;
    let sent = sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].split("\n\n").count(), 199);
}

#[test]
fn unknown_channel_aborts_startup() {
    let mut config = test_config(false);
    config.disku.alert_channel = "carrier-pigeon".to_string();
    let err = ReportEngine::from_config(&config, ChannelRegistry::default())
        .err()
        .expect("unknown channel should fail");
    assert!(err.to_string().contains("carrier-pigeon"));
}

#[test]
fn malformed_conditions_or_interval_abort_startup() {
    let (registry, _) = recording_registry();
    let mut config = test_config(false);
    config.disku.alert_conditions = "FREE < 5G, USED >> 95%".to_string();
    assert!(ReportEngine::from_config(&config, registry).is_err());

    let (registry, _) = recording_registry();
    let mut config = test_config(false);
    config.disku.alert_interval = "soon".to_string();
    assert!(ReportEngine::from_config(&config, registry).is_err());
}

#[test]
fn webhook_without_url_aborts_startup() {
    let mut config = test_config(false);
    config.disku.alert_channel = "webhook".to_string();
    assert!(ReportEngine::from_config(&config, ChannelRegistry::default()).is_err());
}

#[test]
fn message_template_placeholders() {
    let usage = disku_common::types::DiskUsage {
        total: 200,
        used: 150,
        free: 50,
    };
    let text = render_message(
        "{{machine}}:{{path}} {{condition}} {{used}}/{{total}} free={{free}} {{used_percent}}% {{free_percent}}%",
        "web-01",
        "/data",
        "USED > 50%",
        &usage,
    );
    assert_eq!(text, "web-01:/data USED > 50% 150/200 free=50 75.0% 25.0%");
}
