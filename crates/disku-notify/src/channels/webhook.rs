use crate::config::ConfigView;
use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use async_trait::async_trait;
use disku_alert::units::parse_interval;
use serde_json::{Map, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Posts alert text to a Slack/Mattermost compatible incoming webhook.
///
/// The payload is the configured `mixin` JSON object with `"text"` set to the
/// alert message, so channel, username or icon overrides can be supplied
/// through configuration.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
    mixin_source: Option<String>,
    mixin: Map<String, Value>,
}

impl WebhookChannel {
    pub fn new(url: &str, mixin: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
            mixin_source: mixin,
            mixin: Map::new(),
        })
    }

    pub fn mixin(&self) -> &Map<String, Value> {
        &self.mixin
    }

    pub fn payload(&self, text: &str) -> Value {
        let mut data = self.mixin.clone();
        data.insert("text".to_string(), Value::String(text.to_string()));
        Value::Object(data)
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn prepare(&mut self) -> Result<()> {
        let Some(source) = self.mixin_source.as_deref() else {
            return Ok(());
        };

        self.mixin = match serde_json::from_str::<Value>(source) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(mixin = %other, "Webhook mixin is not a JSON object, ignoring");
                Map::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Webhook mixin is not valid JSON, ignoring");
                Map::new()
            }
        };
        tracing::info!(mixin = ?self.mixin, "Webhook mixin loaded");
        Ok(())
    }

    async fn notify(&self, text: &str) -> bool {
        let data = self.payload(text);
        tracing::debug!(payload = %data, "Sending webhook message");

        match self.client.post(&self.url).json(&data).send().await {
            Ok(resp) => {
                let status = resp.status();
                tracing::debug!(status = %status, "Webhook responded");
                if status == reqwest::StatusCode::OK {
                    true
                } else {
                    tracing::warn!(url = %self.url, status = %status, "Webhook rejected message");
                    false
                }
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Error during sending webhook request");
                false
            }
        }
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }
}

// Plugin

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn create_channel(&self, config: &ConfigView) -> Result<Box<dyn NotificationChannel>> {
        let url = config
            .get("url")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| NotifyError::InvalidConfig("webhook requires 'url'".to_string()))?;

        let timeout_secs = match config.get("timeout") {
            Some(raw) => parse_interval(raw)
                .map_err(|e| NotifyError::InvalidConfig(format!("webhook timeout: {e}")))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Box::new(WebhookChannel::new(
            url,
            config.get("mixin").map(str::to_string),
            Duration::from_secs(timeout_secs),
        )?))
    }
}
