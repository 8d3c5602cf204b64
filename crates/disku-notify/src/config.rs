use std::collections::BTreeMap;

/// Read-only, case-insensitive key/value configuration.
///
/// Keys are lower-cased once on construction. Channel configuration is
/// stored under dotted keys (`webhook.url`) and handed to each channel
/// through [`ConfigView::scoped`], so a channel only sees its own keys.
///
/// # Examples
///
/// ```
/// use disku_notify::config::ConfigView;
///
/// let config = ConfigView::from_pairs([
///     ("Webhook.URL", "http://localhost/hook"),
///     ("disku.alert_channel", "webhook"),
/// ]);
/// let webhook = config.scoped("WEBHOOK");
/// assert_eq!(webhook.get("url"), Some("http://localhost/hook"));
/// assert_eq!(webhook.get("alert_channel"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigView {
    entries: BTreeMap<String, String>,
}

impl ConfigView {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Returns the keys under `namespace.`, with the prefix stripped.
    pub fn scoped(&self, namespace: &str) -> ConfigView {
        let prefix = format!("{}.", namespace.to_lowercase());
        Self {
            entries: self
                .entries
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(&prefix)
                        .map(|rest| (rest.to_string(), v.clone()))
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
