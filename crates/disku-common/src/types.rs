use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Reporter identity used when a report carries neither an identifier
/// nor a hostname.
pub const UNKNOWN_REPORTER: &str = "unknown";

/// Disk usage of the filesystem holding one monitored path, in bytes.
///
/// `used + free == total` is expected but not enforced; filesystems with
/// reserved blocks report slightly less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    /// Fraction of `total` that is used. Not guarded against `total == 0`.
    pub fn used_ratio(&self) -> f64 {
        self.used as f64 / self.total as f64
    }

    /// Fraction of `total` that is free. Not guarded against `total == 0`.
    pub fn free_ratio(&self) -> f64 {
        self.free as f64 / self.total as f64
    }
}

/// Host metadata sent by the agent alongside its disk usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Operator-chosen name for the machine, preferred over `hostname`.
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Output of `ip route get` towards the server (`dev`, `src`, `via`).
    #[serde(default)]
    pub route: Option<HashMap<String, String>>,
    /// Addresses of the outgoing interface (`link/ether`, `inet`, `inet6`).
    #[serde(default)]
    pub interface: Option<HashMap<String, String>>,
}

impl ClientInfo {
    /// Key used to group buffered alerts per machine: the identifier when
    /// set and non-empty, else the hostname.
    ///
    /// # Examples
    ///
    /// ```
    /// use disku_common::types::ClientInfo;
    ///
    /// let mut info = ClientInfo {
    ///     hostname: Some("web-01".into()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(info.reporter_id(), "web-01");
    ///
    /// info.identifier = Some("billing-db".into());
    /// assert_eq!(info.reporter_id(), "billing-db");
    /// ```
    pub fn reporter_id(&self) -> &str {
        [&self.identifier, &self.hostname]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_REPORTER)
    }
}

/// One report submitted by an agent.
///
/// Samples are kept as raw JSON so that a malformed entry for one path does
/// not reject the whole report; they are validated per path on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub client_info: ClientInfo,
    pub disk_usage: BTreeMap<String, Value>,
}
