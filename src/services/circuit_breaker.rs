//! Circuit breaker shared by the Geocoder and Router adapters:
//! opens after a run of consecutive transient failures and refuses calls
//! until a recovery window has elapsed, then lets one probe through
//! (half-open) before fully closing again on success.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    last_failure: Mutex<Option<Instant>>,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
            last_failure: Mutex::new(None),
            recovery_time,
        }
    }

    /// `true` if calls should currently be rejected.
    pub fn is_open(&self) -> bool {
        let count = self.failure_count.load(Ordering::Relaxed);
        if count < self.threshold {
            return false;
        }
        let last = self.last_failure.lock().unwrap();
        match *last {
            Some(t) if t.elapsed() >= self.recovery_time => false, // half-open: allow a probe
            Some(_) => true,
            None => false,
        }
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock().unwrap() = Some(Instant::now());
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(!cb.is_open());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn half_opens_after_recovery_window() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(30));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cb.is_open());
    }
}
