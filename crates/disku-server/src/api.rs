use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use disku_common::types::Report;
use serde_json::Value;

pub const REPORT_PATH: &str = "/disku/report";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/config", get(dump_config))
        .route(REPORT_PATH, post(report))
}

fn plain_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Accepts a disk usage report from an agent and answers with the alert
/// messages it produced (empty body when nothing matched).
async fn report(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Report body is not JSON");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if value.get("client_info").is_none() || value.get("disk_usage").is_none() {
        tracing::warn!("Report lacks client_info or disk_usage");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let report: Report = match serde_json::from_value(value) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed report");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let messages = state.engine.ingest(&report).await;
    plain_text(messages.join("\n"))
}

async fn index(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let url_report = format!("http://{host}{REPORT_PATH}");

    plain_text(format!(
        "\
DISKU - disk usage monitor utility
==================================

* Config your agent reporting to {url_report}

Example of agent usage:

  disku-agent -u {url_report} /
"
    ))
}

/// Dumps the effective configuration when `disku.debug` is enabled.
async fn dump_config(State(state): State<AppState>) -> Response {
    if !state.config.disku.debug {
        return StatusCode::NOT_FOUND.into_response();
    }

    let dump = state
        .config
        .to_view()
        .iter()
        .map(|(k, v)| format!("{k} => {v:?}"))
        .collect::<Vec<_>>()
        .join("\n");
    plain_text(dump)
}
