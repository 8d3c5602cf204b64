//! Notification delivery for batched disk alerts.
//!
//! A [`NotificationChannel`] delivers one block of alert text to an external
//! service. Channels are created by name through the
//! [`ChannelRegistry`](plugin::ChannelRegistry), which looks the name up
//! case-insensitively, runs [`NotificationChannel::prepare`] once and caches
//! the instance for the lifetime of the process. The only built-in channel is
//! a Slack/Mattermost compatible webhook.

pub mod channels;
pub mod config;
pub mod error;
pub mod plugin;


use async_trait::async_trait;

/// A notification sink that delivers alert text to an external service.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// One-time initialization, run by the registry right after the channel
    /// is created and before it is shared.
    ///
    /// # Errors
    ///
    /// An error aborts channel resolution.
    fn prepare(&mut self) -> error::Result<()> {
        Ok(())
    }

    /// Delivers `text`. Returns `true` if the remote side accepted it.
    ///
    /// Delivery failures are logged and reported as `false`, never as an
    /// error; nothing is retried.
    async fn notify(&self, text: &str) -> bool;

    /// Returns the channel type name (e.g. `"webhook"`).
    fn channel_type(&self) -> &str;
}
