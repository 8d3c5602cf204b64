use anyhow::Context;
use disku_notify::config::ConfigView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "DISKU_CONFIG_FILE";

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub disku: DiskuConfig,
    /// Every other table is channel configuration, keyed by channel name
    /// (e.g. `[webhook]`).
    #[serde(flatten)]
    pub channels: BTreeMap<String, toml::Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskuConfig {
    /// Comma-separated threshold conditions, e.g. `"FREE < 5G, USED > 95%"`.
    #[serde(default = "default_alert_conditions")]
    pub alert_conditions: String,
    /// Minimum time between two notifications, e.g. `"1h"` or `"90m"`.
    #[serde(default = "default_alert_interval")]
    pub alert_interval: String,
    /// Name of the notification channel, matched case-insensitively.
    #[serde(default = "default_alert_channel")]
    pub alert_channel: String,
    /// Per-path message template; see [`crate::engine::render_message`].
    #[serde(default = "default_alert_msg")]
    pub alert_msg: String,
    /// Exposes the effective configuration on `GET /config`.
    #[serde(default)]
    pub debug: bool,
    /// How often pending alerts are checked without waiting for a report.
    /// `"0"` keeps the flush-on-report behavior only.
    #[serde(default = "default_flush_tick")]
    pub flush_tick: String,
}

impl Default for DiskuConfig {
    fn default() -> Self {
        Self {
            alert_conditions: default_alert_conditions(),
            alert_interval: default_alert_interval(),
            alert_channel: default_alert_channel(),
            alert_msg: default_alert_msg(),
            debug: false,
            flush_tick: default_flush_tick(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_alert_conditions() -> String {
    "FREE < 5G, USED > 95%".to_string()
}

fn default_alert_interval() -> String {
    "1h".to_string()
}

fn default_alert_channel() -> String {
    "webhook".to_string()
}

fn default_alert_msg() -> String {
    "[{{machine}}] {{path}}: {{condition}} (used {{used_percent}}%, free {{free}} of {{total}} bytes)"
        .to_string()
}

fn default_flush_tick() -> String {
    "0".to_string()
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Loads the file given on the command line, else the one named by
    /// `DISKU_CONFIG_FILE`, else `config/server.toml`. Only the implicit
    /// default path may be absent, in which case built-in defaults apply.
    pub fn resolve(cli_path: Option<&Path>) -> anyhow::Result<Self> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

        match explicit {
            Some(path) => Self::load(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => {
                tracing::warn!(
                    path = DEFAULT_CONFIG_PATH,
                    "No config file found, using built-in defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Flattens the whole configuration into dotted, lower-cased keys
    /// (`server.port`, `disku.alert_channel`, `webhook.url`).
    pub fn to_view(&self) -> ConfigView {
        let mut pairs = vec![
            ("server.bind".to_string(), self.server.bind.clone()),
            ("server.port".to_string(), self.server.port.to_string()),
            (
                "disku.alert_conditions".to_string(),
                self.disku.alert_conditions.clone(),
            ),
            (
                "disku.alert_interval".to_string(),
                self.disku.alert_interval.clone(),
            ),
            (
                "disku.alert_channel".to_string(),
                self.disku.alert_channel.clone(),
            ),
            ("disku.alert_msg".to_string(), self.disku.alert_msg.clone()),
            ("disku.debug".to_string(), self.disku.debug.to_string()),
            ("disku.flush_tick".to_string(), self.disku.flush_tick.clone()),
        ];

        for (channel, table) in &self.channels {
            for (key, value) in table {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                pairs.push((format!("{channel}.{key}"), value));
            }
        }

        ConfigView::from_pairs(pairs)
    }
}
