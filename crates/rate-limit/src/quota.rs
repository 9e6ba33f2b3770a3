use gatewarden_common::{Span, SpanLimits};

use crate::window::WindowCounter;

/// Per-client quota state: one window counter per span plus the limits
/// currently in force for the client.
#[derive(Debug)]
pub struct ClientQuota {
    limits: SpanLimits,
    counters: [WindowCounter; 4],
    last_activity_ms: u64,
}

fn span_index(span: Span) -> usize {
    match span {
        Span::Second => 0,
        Span::Minute => 1,
        Span::Hour => 2,
        Span::Day => 3,
    }
}

impl ClientQuota {
    pub fn new(limits: SpanLimits, now_ms: u64) -> Self {
        Self {
            limits,
            counters: [
                WindowCounter::new(Span::Second.millis()),
                WindowCounter::new(Span::Minute.millis()),
                WindowCounter::new(Span::Hour.millis()),
                WindowCounter::new(Span::Day.millis()),
            ],
            last_activity_ms: now_ms,
        }
    }

    pub fn limits(&self) -> &SpanLimits {
        &self.limits
    }

    /// Replace the limits in force. Recorded history is kept so a policy
    /// change never resets a client's windows.
    pub fn set_limits(&mut self, limits: SpanLimits) {
        self.limits = limits;
    }

    pub fn counter(&self, span: Span) -> &WindowCounter {
        &self.counters[span_index(span)]
    }

    pub fn counter_mut(&mut self, span: Span) -> &mut WindowCounter {
        &mut self.counters[span_index(span)]
    }

    pub fn prune_all(&mut self, now_ms: u64) {
        for counter in &mut self.counters {
            counter.prune(now_ms);
        }
    }

    /// Record one admitted request against every span at once.
    pub fn record_all(&mut self, now_ms: u64) {
        for counter in &mut self.counters {
            counter.record(now_ms);
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    /// True when every counter is empty. Callers prune first.
    pub fn is_empty(&self) -> bool {
        self.counters.iter().all(WindowCounter::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SpanLimits {
        SpanLimits {
            per_second: 2,
            per_minute: 5,
            per_hour: 10,
            per_day: 20,
        }
    }

    #[test]
    fn record_counts_against_every_span() {
        let mut quota = ClientQuota::new(limits(), 0);
        quota.record_all(0);
        quota.record_all(10);
        for span in Span::ALL {
            assert_eq!(quota.counter(span).count(), 2, "span {span}");
        }
    }

    #[test]
    fn prune_is_per_span() {
        let mut quota = ClientQuota::new(limits(), 0);
        quota.record_all(0);

        // Two seconds later the second window is clear, the rest are not.
        quota.prune_all(2_000);
        assert_eq!(quota.counter(Span::Second).count(), 0);
        assert_eq!(quota.counter(Span::Minute).count(), 1);
        assert_eq!(quota.counter(Span::Day).count(), 1);
        assert!(!quota.is_empty());

        // Past the day window everything is gone.
        quota.prune_all(86_400_000);
        assert!(quota.is_empty());
    }

    #[test]
    fn set_limits_keeps_history() {
        let mut quota = ClientQuota::new(limits(), 0);
        quota.record_all(0);
        quota.set_limits(SpanLimits {
            per_second: 100,
            per_minute: 100,
            per_hour: 100,
            per_day: 100,
        });
        assert_eq!(quota.counter(Span::Minute).count(), 1);
        assert_eq!(quota.limits().per_second, 100);
    }
}
