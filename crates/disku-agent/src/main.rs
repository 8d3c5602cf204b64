mod collect;
mod error;

use clap::Parser;
use disku_common::types::Report;
use error::AgentError;
use reqwest::Url;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "DISKU_LOG_LEVEL";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Report disk usage of the given paths to a disku server.
#[derive(Debug, Parser)]
#[command(name = "disku-agent", version)]
struct Cli {
    /// Report endpoint, e.g. `http://monitor:8080/disku/report`.
    #[arg(short, long)]
    url: String,

    /// Do not run `ip` to collect route and interface details.
    #[arg(short = 'n', long)]
    no_external_program: bool,

    /// Name reported for this machine instead of the hostname.
    #[arg(short, long)]
    identifier: Option<String>,

    /// Paths whose filesystems are reported.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

/// Parses the `--url` argument, which names the report endpoint itself.
fn report_url(raw: &str) -> Result<Url, AgentError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| AgentError::Config(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AgentError::Config(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(AgentError::Config(format!("{raw}: missing host")));
    }
    Ok(url)
}

async fn resolve_host(url: &Url) -> Result<IpAddr, AgentError> {
    let host = url
        .host_str()
        .ok_or_else(|| AgentError::Config("missing host".into()))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let host = host.trim_start_matches('[').trim_end_matches(']');
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AgentError::Network(format!("{host}: {e}")))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| AgentError::Network(format!("{host}: no address")))
}

async fn run(cli: Cli) -> Result<(), AgentError> {
    let url = report_url(&cli.url)?;
    let host = resolve_host(&url).await?;
    tracing::debug!(%url, %host, "Resolved server");

    let mut client_info = collect::collect_info(Some(host), !cli.no_external_program);
    client_info.identifier = cli.identifier;

    let disk_usage = collect::check_disk_usage(&cli.paths)?
        .into_iter()
        .map(|(path, usage)| {
            serde_json::to_value(usage)
                .map(|value| (path, value))
                .map_err(|e| AgentError::Env(e.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let report = Report {
        client_info,
        disk_usage,
    };

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AgentError::Network(e.to_string()))?;
    let resp = client
        .post(url)
        .json(&report)
        .send()
        .await
        .map_err(|e| AgentError::Network(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(AgentError::Response(status.as_u16()));
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::info!(status = status.as_u16(), response = %body, "Report sent");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Report failed");
            eprintln!("{e}");
            e.exit_code()
        }
    }
}
