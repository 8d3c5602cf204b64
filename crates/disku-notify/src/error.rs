/// Errors that can occur while resolving or building a notification channel.
///
/// Delivery itself never fails with an error: [`crate::NotificationChannel::notify`]
/// reports failures as `false`.
///
/// # Examples
///
/// ```rust
/// use disku_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing url".to_string());
/// assert!(err.to_string().contains("url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required key or has an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// No plugin is registered under the requested channel name.
    #[error("Notify: unknown channel type '{0}'")]
    UnknownChannelType(String),

    /// Building the HTTP client failed.
    #[error("Notify: HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
