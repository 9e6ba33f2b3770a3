use std::collections::VecDeque;

/// A sliding log of event timestamps inside one fixed time span.
///
/// Timestamps are milliseconds since the Unix epoch, appended in
/// non-decreasing order. After [`prune`](Self::prune), every retained
/// timestamp satisfies `now - ts < span_ms`.
#[derive(Debug)]
pub struct WindowCounter {
    span_ms: u64,
    events: VecDeque<u64>,
}

impl WindowCounter {
    pub fn new(span_ms: u64) -> Self {
        Self {
            span_ms,
            events: VecDeque::new(),
        }
    }

    /// Drop timestamps that have aged out of the span.
    pub fn prune(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.events.front() {
            if now_ms.saturating_sub(oldest) >= self.span_ms {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record(&mut self, now_ms: u64) {
        self.events.push_back(now_ms);
    }

    pub fn count(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn oldest(&self) -> Option<u64> {
        self.events.front().copied()
    }

    /// Seconds until the oldest retained timestamp expires, rounded up.
    /// An empty counter reports the full span.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        match self.oldest() {
            Some(oldest) => {
                let remaining_ms = (oldest + self.span_ms).saturating_sub(now_ms);
                (remaining_ms + 999) / 1_000
            }
            None => (self.span_ms + 999) / 1_000,
        }
    }

    /// When the window frees its next slot, in epoch milliseconds. An empty
    /// counter resets immediately.
    pub fn reset_at_ms(&self, now_ms: u64) -> u64 {
        match self.oldest() {
            Some(oldest) => oldest + self.span_ms,
            None => now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_drops_expired_only() {
        let mut counter = WindowCounter::new(1_000);
        counter.record(0);
        counter.record(500);
        counter.record(999);

        counter.prune(999);
        assert_eq!(counter.count(), 3);

        // The event at t=0 ages out exactly at t=1000.
        counter.prune(1_000);
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.oldest(), Some(500));

        counter.prune(10_000);
        assert!(counter.is_empty());
    }

    #[test]
    fn retry_after_rounds_up() {
        let mut counter = WindowCounter::new(1_000);
        counter.record(0);

        // 990ms remain on the oldest event: rounds up to a whole second.
        assert_eq!(counter.retry_after_secs(10), 1);
        // Exactly expired: no wait.
        assert_eq!(counter.retry_after_secs(1_000), 0);
        assert_eq!(counter.retry_after_secs(5_000), 0);
    }

    #[test]
    fn retry_after_on_empty_counter_is_full_span() {
        let counter = WindowCounter::new(60_000);
        assert_eq!(counter.retry_after_secs(12_345), 60);
    }

    #[test]
    fn reset_at_tracks_oldest() {
        let mut counter = WindowCounter::new(1_000);
        assert_eq!(counter.reset_at_ms(42), 42);
        counter.record(100);
        counter.record(900);
        assert_eq!(counter.reset_at_ms(950), 1_100);
    }
}
