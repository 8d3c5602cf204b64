use crate::config::ConfigView;
use crate::error::{NotifyError, Result};
use crate::NotificationChannel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Factory for [`NotificationChannel`] instances.
///
/// Each plugin is registered in the [`ChannelRegistry`] under its `name()`;
/// the name is also the configuration namespace the channel reads from.
pub trait ChannelPlugin: Send + Sync {
    /// Returns the plugin type name (e.g., `"webhook"`).
    fn name(&self) -> &str;

    /// Creates an unprepared channel from its scoped configuration.
    fn create_channel(&self, config: &ConfigView) -> Result<Box<dyn NotificationChannel>>;
}

/// Registry of available [`ChannelPlugin`]s plus a cache of the channels
/// already resolved from them.
///
/// # Examples
///
/// ```
/// use disku_notify::plugin::ChannelRegistry;
///
/// let registry = ChannelRegistry::default();
/// assert!(registry.has_plugin("webhook"));
/// assert!(registry.has_plugin("WebHook"));
/// assert!(!registry.has_plugin("nonexistent"));
/// ```
pub struct ChannelRegistry {
    plugins: HashMap<String, Box<dyn ChannelPlugin>>,
    resolved: Mutex<HashMap<String, Arc<dyn NotificationChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        let name = plugin.name().to_lowercase();
        self.plugins.insert(name, plugin);
    }

    /// Returns the channel registered as `name`, creating and preparing it
    /// on first use.
    ///
    /// `config` is the full configuration; the channel only receives the
    /// keys under its own name. Later calls return the cached instance and
    /// ignore `config`.
    ///
    /// # Errors
    ///
    /// [`NotifyError::UnknownChannelType`] if no plugin has that name, or
    /// whatever the plugin's construction or `prepare` step reports.
    pub fn resolve(&self, name: &str, config: &ConfigView) -> Result<Arc<dyn NotificationChannel>> {
        let key = name.to_lowercase();
        // Held across creation so concurrent first callers prepare only once.
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(channel) = resolved.get(&key) {
            return Ok(Arc::clone(channel));
        }

        let plugin = self.plugins.get(&key).ok_or_else(|| {
            tracing::error!(channel = name, "Can not find alert channel plugin");
            NotifyError::UnknownChannelType(name.to_string())
        })?;

        let mut channel = plugin.create_channel(&config.scoped(&key))?;
        channel.prepare()?;
        tracing::info!(channel = name, "Alert channel prepared");

        let channel: Arc<dyn NotificationChannel> = Arc::from(channel);
        resolved.insert(key, Arc::clone(&channel));
        Ok(channel)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(&name.to_lowercase())
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry
    }
}
