use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use chrono::Utc;
use gatewarden_common::{GatewardenError, Policy};
use tracing::{debug, info, warn};

use crate::snapshot::ConfigSnapshot;
use crate::source::PolicySource;
use crate::validate::{default_validator, Validator};

/// Result of a reload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied { version: u64 },
    /// The source content matches the current snapshot; the version
    /// counter is not bumped.
    Unchanged,
    /// The candidate failed schema or semantic validation; the prior
    /// snapshot stays fully in effect.
    Rejected { errors: Vec<String> },
    /// The source could not be read at all; the prior snapshot stays
    /// fully in effect.
    Failed { error: String },
}

/// Result of a rollback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The target became current under a new version number: rollback is
    /// forward progress, history only grows.
    Applied { version: u64, restored_from: u64 },
    Rejected { reason: String },
}

struct ApplyState {
    applying: bool,
    last_outcome: Option<ReloadOutcome>,
}

/// The hot-reloadable policy store.
///
/// The current snapshot sits behind an [`ArcSwap`]: readers load it
/// lock-free and always observe either the fully-old or fully-new
/// snapshot. Reloads and rollbacks serialise on a cooperative applying
/// flag; admission checks against the still-current snapshot are never
/// blocked by an in-flight apply.
pub struct ConfigStore {
    source: Box<dyn PolicySource>,
    current: ArcSwap<ConfigSnapshot>,
    history: Mutex<VecDeque<Arc<ConfigSnapshot>>>,
    max_versions: usize,
    validator: Validator,
    apply: Mutex<ApplyState>,
    apply_done: Condvar,
}

impl ConfigStore {
    pub fn new(source: Box<dyn PolicySource>, max_versions: usize) -> Self {
        Self::with_validator(source, max_versions, default_validator())
    }

    pub fn with_validator(
        source: Box<dyn PolicySource>,
        max_versions: usize,
        validator: Validator,
    ) -> Self {
        Self {
            source,
            current: ArcSwap::from_pointee(ConfigSnapshot::uninitialized()),
            history: Mutex::new(VecDeque::new()),
            max_versions,
            validator,
            apply: Mutex::new(ApplyState {
                applying: false,
                last_outcome: None,
            }),
            apply_done: Condvar::new(),
        }
    }

    /// The currently effective snapshot.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Prior snapshots, oldest first.
    pub fn history(&self) -> Vec<Arc<ConfigSnapshot>> {
        self.history
            .lock()
            .expect("history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Run the validator against a candidate set without applying it.
    pub fn validate_candidate(&self, policies: &[Policy]) -> Result<(), Vec<String>> {
        (self.validator)(policies)
    }

    pub fn source_modified(&self) -> Option<SystemTime> {
        self.source.modified()
    }

    /// Read the source, validate, and atomically swap in the new snapshot.
    ///
    /// Concurrent calls while an apply is in flight are coalesced: the
    /// late caller blocks until the in-flight apply finishes and receives
    /// its outcome instead of starting a second, conflicting reload.
    pub fn reload(&self) -> ReloadOutcome {
        {
            let mut state = self.apply.lock().expect("apply lock poisoned");
            if state.applying {
                while state.applying {
                    state = self.apply_done.wait(state).expect("apply lock poisoned");
                }
                let outcome = state
                    .last_outcome
                    .clone()
                    .unwrap_or(ReloadOutcome::Unchanged);
                debug!("reload coalesced with in-flight apply");
                return outcome;
            }
            state.applying = true;
        }

        let outcome = self.apply_from_source();
        self.finish_apply(outcome.clone());
        outcome
    }

    /// Make a historical snapshot current again.
    ///
    /// The target is re-validated under the current validator (a snapshot
    /// that was valid when committed may fail tightened rules), persisted
    /// back to the source, and committed as a new version.
    pub fn rollback(&self, version: Option<u64>) -> RollbackOutcome {
        self.claim_apply();
        let outcome = self.apply_rollback(version);

        let last = match &outcome {
            RollbackOutcome::Applied { version, .. } => ReloadOutcome::Applied {
                version: *version,
            },
            RollbackOutcome::Rejected { reason } => ReloadOutcome::Rejected {
                errors: vec![reason.clone()],
            },
        };
        self.finish_apply(last);
        outcome
    }

    /// Wait for any in-flight apply, then take the flag for ourselves.
    fn claim_apply(&self) {
        let mut state = self.apply.lock().expect("apply lock poisoned");
        while state.applying {
            state = self.apply_done.wait(state).expect("apply lock poisoned");
        }
        state.applying = true;
    }

    fn finish_apply(&self, outcome: ReloadOutcome) {
        let mut state = self.apply.lock().expect("apply lock poisoned");
        state.applying = false;
        state.last_outcome = Some(outcome);
        self.apply_done.notify_all();
    }

    fn apply_from_source(&self) -> ReloadOutcome {
        let policies = match self.source.read() {
            Ok(policies) => policies,
            Err(GatewardenError::Serde(error)) => {
                warn!(%error, "policy reload rejected: candidate does not parse");
                return ReloadOutcome::Rejected {
                    errors: vec![format!("parse error: {error}")],
                };
            }
            Err(error) => {
                warn!(%error, "policy reload failed: source unreadable");
                return ReloadOutcome::Failed {
                    error: error.to_string(),
                };
            }
        };

        if let Err(errors) = (self.validator)(&policies) {
            warn!(problems = errors.len(), "policy reload rejected by validator");
            return ReloadOutcome::Rejected { errors };
        }

        let current = self.current.load();
        if current.healthy && current.policies == policies {
            debug!(version = current.version, "policy reload: content unchanged");
            return ReloadOutcome::Unchanged;
        }

        let version = self.commit(policies);
        info!(version, "policy snapshot applied");
        ReloadOutcome::Applied { version }
    }

    fn apply_rollback(&self, version: Option<u64>) -> RollbackOutcome {
        let target = {
            let history = self.history.lock().expect("history lock poisoned");
            match version {
                Some(wanted) => history.iter().rev().find(|s| s.version == wanted).cloned(),
                None => history.back().cloned(),
            }
        };

        let Some(target) = target else {
            let reason = match version {
                Some(wanted) => format!("version {wanted} is not in the snapshot history"),
                None => "no prior version to roll back to".to_string(),
            };
            return RollbackOutcome::Rejected { reason };
        };

        if let Err(errors) = (self.validator)(&target.policies) {
            warn!(
                target = target.version,
                "rollback rejected: target no longer passes validation"
            );
            return RollbackOutcome::Rejected {
                reason: format!(
                    "version {} no longer passes validation: {}",
                    target.version,
                    errors.join("; ")
                ),
            };
        }

        if let Err(error) = self.source.write(&target.policies) {
            warn!(%error, "rollback failed to persist to the policy source");
            return RollbackOutcome::Rejected {
                reason: format!("failed to persist rollback: {error}"),
            };
        }

        let new_version = self.commit(target.policies.clone());
        info!(
            version = new_version,
            restored_from = target.version,
            "rolled back policy snapshot"
        );
        RollbackOutcome::Applied {
            version: new_version,
            restored_from: target.version,
        }
    }

    /// Swap in a new current snapshot and push the previous one onto the
    /// bounded history. Only ever called with the applying flag held.
    fn commit(&self, policies: Vec<Policy>) -> u64 {
        let previous = self.current.load_full();
        let version = previous.version + 1;
        let snapshot = Arc::new(ConfigSnapshot {
            policies,
            version,
            applied_at: Utc::now(),
            healthy: true,
        });
        self.current.store(snapshot);

        // The uninitialized placeholder is not a restorable version.
        if previous.healthy {
            let mut history = self.history.lock().expect("history lock poisoned");
            history.push_back(previous);
            while history.len() > self.max_versions {
                history.pop_front();
            }
        }
        version
    }
}
