use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug` or
/// `disku=info,tower=warn`).
pub const LOG_LEVEL_ENV: &str = "DISKU_LOG_LEVEL";

/// Environment variable naming a file to append logs to instead of stdout.
pub const LOG_FILE_ENV: &str = "DISKU_LOG_FILE";

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Fails if the filter does not parse or the log file can not be opened.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = match std::env::var(LOG_LEVEL_ENV) {
        Ok(level) => EnvFilter::try_new(level)?,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var_os(LOG_FILE_ENV) {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }
    Ok(())
}

/// Random 16-hex-char id tying a request's log lines to its response.
fn generate_trace_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Logs every request and its response status, and tags the response with
/// an `X-Trace-Id` header. Bodies are left untouched; size limits belong
/// to the handlers.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::info!(trace_id = %trace_id, method = %method, path = %path, "--> request");

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, status = status.as_u16(), elapsed_ms, "<-- response");
    } else if status.is_client_error() {
        tracing::warn!(trace_id = %trace_id, status = status.as_u16(), elapsed_ms, "<-- response");
    } else {
        tracing::info!(trace_id = %trace_id, status = status.as_u16(), elapsed_ms, "<-- response");
    }

    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}
