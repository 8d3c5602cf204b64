use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Pending alert text keyed by reporter identity.
pub type PendingAlerts = BTreeMap<String, String>;

/// Debounce buffer that coalesces alerts into at most one batch per interval.
///
/// There is no timer: the deadline is only checked when [`push`] (or
/// [`flush_due`]) is called. Alerts pushed after a flush stay pending until
/// the next call past the deadline, however long that takes.
///
/// The buffer is not synchronized; callers sharing it between tasks wrap it
/// in a mutex.
///
/// [`push`]: AlertBuffer::push
/// [`flush_due`]: AlertBuffer::flush_due
pub struct AlertBuffer {
    interval: Duration,
    next_flush: DateTime<Utc>,
    pending: PendingAlerts,
}

impl AlertBuffer {
    /// Creates a buffer whose first push flushes immediately.
    pub fn new(interval_secs: u64) -> Self {
        let interval = i64::try_from(interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            interval,
            next_flush: DateTime::UNIX_EPOCH,
            pending: PendingAlerts::new(),
        }
    }

    /// Records `message` for `identifier`, replacing any message still
    /// pending for it, and returns the whole batch if the window has elapsed.
    ///
    /// The returned batch must be delivered by the caller; the buffer is
    /// already cleared and its deadline moved to `now + interval`.
    pub fn push(
        &mut self,
        identifier: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<PendingAlerts> {
        self.pending.insert(identifier.into(), message.into());
        self.flush_due(now)
    }

    /// Flushes pending alerts if the deadline has passed. Does nothing (and
    /// keeps the deadline) when nothing is pending.
    pub fn flush_due(&mut self, now: DateTime<Utc>) -> Option<PendingAlerts> {
        if self.pending.is_empty() || now < self.next_flush {
            return None;
        }

        tracing::info!(reporters = self.pending.len(), "Flushing alert buffer");
        self.next_flush = now
            .checked_add_signed(self.interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(std::mem::take(&mut self.pending))
    }

    pub fn pending(&self) -> &PendingAlerts {
        &self.pending
    }

    pub fn next_flush(&self) -> DateTime<Utc> {
        self.next_flush
    }
}
