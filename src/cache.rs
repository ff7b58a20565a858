use std::time::{Duration, Instant};

/// A single cached value that expires `ttl` after it was stored.
///
/// The caller supplies the current time to every method, which keeps expiry
/// deterministic in tests and lets the server decide what "now" is per request.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    slot: Option<(T, Instant)>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache { slot: None, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True when nothing is stored or the stored value has expired.
    pub fn is_stale(&self, now: Instant) -> bool {
        match &self.slot {
            None => true,
            Some((_, stored_at)) => now.saturating_duration_since(*stored_at) >= self.ttl,
        }
    }

    /// The stored value if it is still fresh.
    pub fn get(&self, now: Instant) -> Option<&T> {
        if self.is_stale(now) {
            return None;
        }
        self.slot.as_ref().map(|(value, _)| value)
    }

    /// The stored value regardless of age.
    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref().map(|(value, _)| value)
    }

    pub fn stored_at(&self) -> Option<Instant> {
        self.slot.as_ref().map(|(_, at)| *at)
    }

    pub fn store(&mut self, value: T, now: Instant) {
        self.slot = Some((value, now));
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}
