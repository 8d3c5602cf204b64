use crate::config::ServerConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use disku_alert::condition::parse_sample;
use disku_alert::units::parse_interval;
use disku_alert::{AlertBuffer, AlertCheck, PendingAlerts};
use disku_common::types::{DiskUsage, Report};
use disku_notify::config::ConfigView;
use disku_notify::plugin::ChannelRegistry;
use tokio::sync::Mutex;

/// Separator between per-reporter messages in one notification.
const BATCH_SEPARATOR: &str = "\n\n";

/// Fills an alert message template.
///
/// Supported placeholders: `{{machine}}`, `{{path}}`, `{{condition}}`,
/// `{{used}}`, `{{free}}`, `{{total}}` (bytes) and `{{used_percent}}`,
/// `{{free_percent}}` (one decimal).
pub fn render_message(
    template: &str,
    machine: &str,
    path: &str,
    condition: &str,
    usage: &DiskUsage,
) -> String {
    template
        .replace("{{machine}}", machine)
        .replace("{{path}}", path)
        .replace("{{condition}}", condition)
        .replace("{{used}}", &usage.used.to_string())
        .replace("{{free}}", &usage.free.to_string())
        .replace("{{total}}", &usage.total.to_string())
        .replace(
            "{{used_percent}}",
            &format!("{:.1}", usage.used_ratio() * 100.0),
        )
        .replace(
            "{{free_percent}}",
            &format!("{:.1}", usage.free_ratio() * 100.0),
        )
}

/// Turns incoming reports into buffered, rate-limited notifications.
///
/// Evaluation is lock-free; the alert buffer sits behind a mutex so
/// concurrent reports never lose an update or flush twice. The lock is
/// released before the channel is called.
pub struct ReportEngine {
    checker: AlertCheck,
    message_template: String,
    buffer: Mutex<AlertBuffer>,
    registry: ChannelRegistry,
    channel_name: String,
    channel_config: ConfigView,
}

impl ReportEngine {
    pub fn new(
        checker: AlertCheck,
        interval_secs: u64,
        message_template: impl Into<String>,
        registry: ChannelRegistry,
        channel_name: impl Into<String>,
        channel_config: ConfigView,
    ) -> Self {
        Self {
            checker,
            message_template: message_template.into(),
            buffer: Mutex::new(AlertBuffer::new(interval_secs)),
            registry,
            channel_name: channel_name.into(),
            channel_config,
        }
    }

    /// Builds the engine from configuration and resolves the alert channel
    /// up front, so malformed conditions, intervals or an unknown channel
    /// stop the server at startup.
    pub fn from_config(config: &ServerConfig, registry: ChannelRegistry) -> anyhow::Result<Self> {
        let checker = AlertCheck::parse(&config.disku.alert_conditions)
            .context("Invalid disku.alert_conditions")?;
        let interval_secs =
            parse_interval(&config.disku.alert_interval).context("Invalid disku.alert_interval")?;
        tracing::debug!(alert_interval = interval_secs, "Alert interval parsed");

        let engine = Self::new(
            checker,
            interval_secs,
            config.disku.alert_msg.clone(),
            registry,
            config.disku.alert_channel.clone(),
            config.to_view(),
        );
        engine
            .registry
            .resolve(&engine.channel_name, &engine.channel_config)
            .with_context(|| format!("Can not load alert channel '{}'", engine.channel_name))?;
        Ok(engine)
    }

    /// Evaluates every path of `report` and returns one message per path
    /// that matched a condition, in path order. Invalid samples are logged
    /// and skipped.
    pub fn evaluate(&self, report: &Report) -> Vec<String> {
        let machine = report.client_info.reporter_id();
        let mut messages = Vec::new();

        for (path, sample) in &report.disk_usage {
            let usage = match parse_sample(sample) {
                Ok(usage) => usage,
                Err(e) => {
                    tracing::warn!(machine, path = %path, error = %e, "Skipping disk usage sample");
                    continue;
                }
            };

            if let Some(condition) = self.checker.evaluate(&usage) {
                messages.push(render_message(
                    &self.message_template,
                    machine,
                    path,
                    condition,
                    &usage,
                ));
            }
        }

        messages
    }

    /// Handles one report: evaluates it, buffers the resulting alert under
    /// the reporter identity and delivers a batch if one is due.
    ///
    /// Returns the alert messages produced for this report.
    pub async fn ingest(&self, report: &Report) -> Vec<String> {
        self.ingest_at(report, Utc::now()).await
    }

    pub async fn ingest_at(&self, report: &Report, now: DateTime<Utc>) -> Vec<String> {
        let machine = report.client_info.reporter_id();
        tracing::info!(machine, paths = report.disk_usage.len(), "Got report");

        let messages = self.evaluate(report);
        if messages.is_empty() {
            return messages;
        }

        let batch = self
            .buffer
            .lock()
            .await
            .push(machine, messages.join("\n"), now);
        if let Some(batch) = batch {
            self.deliver(batch).await;
        }
        messages
    }

    /// Delivers pending alerts whose window has elapsed even though no new
    /// report arrived. Returns whether a batch was sent.
    pub async fn flush_due(&self) -> bool {
        self.flush_due_at(Utc::now()).await
    }

    pub async fn flush_due_at(&self, now: DateTime<Utc>) -> bool {
        let batch = self.buffer.lock().await.flush_due(now);
        match batch {
            Some(batch) => self.deliver(batch).await,
            None => false,
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.buffer.lock().await.pending().len()
    }

    async fn deliver(&self, batch: PendingAlerts) -> bool {
        let channel = match self.registry.resolve(&self.channel_name, &self.channel_config) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(channel = %self.channel_name, error = %e, "Dropping alert batch");
                return false;
            }
        };

        let text = batch.into_values().collect::<Vec<_>>().join(BATCH_SEPARATOR);
        let delivered = channel.notify(&text).await;
        if delivered {
            tracing::info!(channel = channel.channel_type(), "Alert batch delivered");
        } else {
            tracing::error!(channel = channel.channel_type(), "Alert batch delivery failed");
        }
        delivered
    }
}
