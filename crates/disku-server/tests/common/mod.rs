#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use disku_notify::config::ConfigView;
use disku_notify::error::Result as NotifyResult;
use disku_notify::plugin::{ChannelPlugin, ChannelRegistry};
use disku_notify::NotificationChannel;
use disku_server::app;
use disku_server::config::{DiskuConfig, ServerConfig};
use disku_server::engine::ReportEngine;
use disku_server::state::AppState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const GIB: u64 = 1 << 30;
pub const CONDITIONS: &str = "FREE == 100G, FREE < 5G, USED > 10G, USED > 95%";

pub type Sent = Arc<Mutex<Vec<String>>>;

/// Channel that records every notification instead of sending it.
pub struct RecordingChannel {
    sent: Sent,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn notify(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        true
    }

    fn channel_type(&self) -> &str {
        "recording"
    }
}

pub struct RecordingPlugin {
    pub sent: Sent,
}

impl ChannelPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_channel(&self, _config: &ConfigView) -> NotifyResult<Box<dyn NotificationChannel>> {
        Ok(Box::new(RecordingChannel {
            sent: Arc::clone(&self.sent),
        }))
    }
}

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    pub sent: Sent,
}

pub fn test_config(debug: bool) -> ServerConfig {
    ServerConfig {
        disku: DiskuConfig {
            alert_conditions: CONDITIONS.to_string(),
            alert_interval: "10s".to_string(),
            alert_channel: "Recording".to_string(),
            alert_msg: "{{machine}} {{path}} {{condition}}".to_string(),
            debug,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn recording_registry() -> (ChannelRegistry, Sent) {
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ChannelRegistry::default();
    registry.register(Box::new(RecordingPlugin {
        sent: Arc::clone(&sent),
    }));
    (registry, sent)
}

pub fn build_test_context(debug: bool) -> TestContext {
    let config = test_config(debug);
    let (registry, sent) = recording_registry();
    let engine = ReportEngine::from_config(&config, registry).expect("test config should load");

    let state = AppState {
        engine: Arc::new(engine),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state.clone());
    TestContext { state, app, sent }
}

/// Builds a report body; each path is `(path, used_gib, free_gib)` on a
/// 100 GiB disk.
pub fn report_json(hostname: &str, identifier: Option<&str>, paths: &[(&str, u64, u64)]) -> Value {
    let disk_usage: serde_json::Map<String, Value> = paths
        .iter()
        .map(|(path, used, free)| {
            (
                path.to_string(),
                json!({ "total": 100 * GIB, "used": used * GIB, "free": free * GIB }),
            )
        })
        .collect();

    json!({
        "client_info": {
            "hostname": hostname,
            "identifier": identifier,
            "platform": "Linux-6.1-x86_64",
            "mac_address": "02:42:ac:11:00:02",
        },
        "disk_usage": disk_usage,
    })
}

pub async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri).header("host", "disku.test");
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .expect("request should build");

    let resp = app.clone().oneshot(req).await.expect("router should respond");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    (status, String::from_utf8_lossy(&bytes).to_string())
}

pub async fn post_report(app: &axum::Router, report: &Value) -> (StatusCode, String) {
    request(app, "POST", "/disku/report", Some(report.to_string())).await
}
