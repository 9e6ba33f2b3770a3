use chrono::{DateTime, Utc};
use gatewarden_common::Policy;
use serde::Serialize;

/// An immutable, versioned set of currently-effective policies.
///
/// Snapshots are created on successful validation of a reload or rollback
/// and never mutated afterwards; the store hands out `Arc`s and swaps the
/// current pointer wholesale.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub policies: Vec<Policy>,
    pub version: u64,
    pub applied_at: DateTime<Utc>,
    /// False only for the uninitialized placeholder the store serves
    /// before the first successful reload.
    pub healthy: bool,
}

impl ConfigSnapshot {
    /// The empty placeholder in effect before any configuration has been
    /// applied.
    pub fn uninitialized() -> Self {
        Self {
            policies: Vec::new(),
            version: 0,
            applied_at: Utc::now(),
            healthy: false,
        }
    }
}
