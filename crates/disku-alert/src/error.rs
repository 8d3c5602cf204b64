/// Errors raised while parsing alert configuration or validating samples.
///
/// # Examples
///
/// ```rust
/// use disku_alert::units::parse_interval;
/// use disku_alert::AlertError;
///
/// let err = parse_interval("bogus").unwrap_err();
/// assert!(matches!(err, AlertError::Parse { kind: "interval", .. }));
/// assert!(err.to_string().contains("bogus"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A condition, interval or size literal does not match its grammar.
    /// `fragment` is the offending piece of input.
    #[error("Alert: invalid {kind}: {fragment:?}")]
    Parse {
        kind: &'static str,
        fragment: String,
    },

    /// A disk usage sample lacks `total`, `used` or `free`, or one of them
    /// is not a non-negative integer.
    #[error("Alert: invalid disk usage sample: {0}")]
    InvalidSample(String),
}

impl AlertError {
    pub(crate) fn parse(kind: &'static str, fragment: &str) -> Self {
        Self::Parse {
            kind,
            fragment: fragment.to_string(),
        }
    }
}

/// Convenience `Result` alias for alerting operations.
pub type Result<T> = std::result::Result<T, AlertError>;
