//! Validated hot-reload of the policy configuration, with rollback.
//!
//! The store owns the currently effective [`ConfigSnapshot`] behind an
//! atomic pointer swap plus a bounded history of prior snapshots. Reloads
//! read the external [`PolicySource`], run the injected validator, and only
//! commit on success; a failed or in-flight reload never pauses admission
//! checks against the still-current snapshot. The file watcher debounces
//! change bursts into a single apply cycle.

pub mod snapshot;
pub mod source;
pub mod store;
pub mod validate;
pub mod watch;

pub use snapshot::ConfigSnapshot;
pub use source::{FilePolicySource, MemorySource, PolicySource};
pub use store::{ConfigStore, ReloadOutcome, RollbackOutcome};
pub use validate::{default_validator, validate_policies, Validator};
pub use watch::start_watch_task;
