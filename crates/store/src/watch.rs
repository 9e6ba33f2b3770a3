use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use gatewarden_common::config::WatchConfig;
use tracing::{debug, info, warn};

use crate::store::{ConfigStore, ReloadOutcome};

/// Spawn a background thread that watches the policy source for change.
///
/// Detection is edge-triggered on the source's modified stamp and
/// debounced: each observed change pushes the apply deadline forward, so a
/// burst of rapid writes collapses into a single validate-and-apply cycle
/// once the source has been quiet for the debounce window.
pub fn start_watch_task(store: Arc<ConfigStore>, config: &WatchConfig) {
    let poll = Duration::from_millis(config.poll_ms.max(10));
    let debounce = Duration::from_millis(config.debounce_ms);

    std::thread::Builder::new()
        .name("policy-watch".into())
        .spawn(move || {
            let mut last_seen = store.source_modified();
            let mut quiet_since: Option<Instant> = None;
            loop {
                std::thread::sleep(poll);
                tick(&store, &mut last_seen, &mut quiet_since, debounce);
            }
        })
        .expect("failed to spawn policy watch thread");
}

/// One poll iteration, split out so the debounce logic is testable
/// without a thread.
pub(crate) fn tick(
    store: &ConfigStore,
    last_seen: &mut Option<SystemTime>,
    quiet_since: &mut Option<Instant>,
    debounce: Duration,
) {
    let stamp = store.source_modified();
    if stamp != *last_seen {
        *last_seen = stamp;
        *quiet_since = Some(Instant::now());
        debug!("policy source changed; debouncing");
        return;
    }

    if let Some(since) = *quiet_since {
        if since.elapsed() >= debounce {
            *quiet_since = None;
            match store.reload() {
                ReloadOutcome::Applied { version } => {
                    info!(version, "watched policy change applied");
                }
                ReloadOutcome::Unchanged => {
                    debug!("watched policy change was a no-op");
                }
                ReloadOutcome::Rejected { errors } => {
                    warn!(problems = errors.len(), "watched policy change rejected");
                }
                ReloadOutcome::Failed { error } => {
                    warn!(%error, "watched policy change could not be read");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use gatewarden_common::{MatchCriteria, Policy};

    fn policy(id: &str) -> Policy {
        Policy {
            id: id.to_string(),
            criteria: MatchCriteria {
                tier: Some("free".to_string()),
                ..Default::default()
            },
            limit: 10,
            window_secs: 60,
            priority: 0,
        }
    }

    #[test]
    fn burst_of_changes_applies_once() {
        let source = Arc::new(MemorySource::new(vec![policy("a")]));
        let store = ConfigStore::new(Box::new(Arc::clone(&source)), 5);
        store.reload();

        let debounce = Duration::from_millis(20);
        let mut last_seen = store.source_modified();
        let mut quiet_since = None;

        // Three rapid writes, each observed by a poll tick: the deadline
        // keeps moving, nothing applies yet.
        for round in 0..3 {
            std::thread::sleep(Duration::from_millis(3));
            let mut policies = vec![policy("a")];
            policies[0].limit = 20 + round;
            source.set(policies);
            tick(&store, &mut last_seen, &mut quiet_since, debounce);
            assert!(quiet_since.is_some());
            assert_eq!(store.current().version, 1);
        }

        // Quiet period elapses: exactly one new version.
        std::thread::sleep(debounce + Duration::from_millis(5));
        tick(&store, &mut last_seen, &mut quiet_since, debounce);
        assert_eq!(store.current().version, 2);
        assert_eq!(store.current().policies[0].limit, 22);
        assert!(quiet_since.is_none());

        // No further change, no further reload.
        std::thread::sleep(debounce + Duration::from_millis(5));
        tick(&store, &mut last_seen, &mut quiet_since, debounce);
        assert_eq!(store.current().version, 2);
    }

    #[test]
    fn unchanged_stamp_never_triggers() {
        let source = Arc::new(MemorySource::new(vec![policy("a")]));
        let store = ConfigStore::new(Box::new(source), 5);
        store.reload();

        let mut last_seen = store.source_modified();
        let mut quiet_since = None;
        for _ in 0..5 {
            tick(
                &store,
                &mut last_seen,
                &mut quiet_since,
                Duration::from_millis(1),
            );
        }
        assert_eq!(store.current().version, 1);
        assert!(quiet_since.is_none());
    }
}
