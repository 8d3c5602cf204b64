//! Threshold alerting for disk usage reports.
//!
//! A comma-separated condition string such as
//! `"FREE < 5G, USED > 95%"` is parsed once into an [`AlertCheck`], which
//! then evaluates each incoming [`DiskUsage`](disku_common::types::DiskUsage)
//! sample in declaration order. Matches are coalesced per reporter by the
//! [`AlertBuffer`](buffer::AlertBuffer) so that a machine sitting above its
//! threshold produces at most one notification per interval.

pub mod buffer;
pub mod condition;
pub mod error;
pub mod units;

#[cfg(test)]
mod tests;

pub use buffer::{AlertBuffer, PendingAlerts};
pub use condition::{AlertCheck, CompareOp, Condition, Threshold, Variable};
pub use error::{AlertError, Result};
