//! Request admission control.
//!
//! A sliding-window log per client key: a request is admitted when fewer than
//! `max_requests` requests were admitted for that key in the trailing window.
//! Rejected requests are not recorded, so a client hammering a full window
//! does not push its own retry time further out.
//!
//! The window arithmetic is a pure function ([`decide`]); [`AdmissionControl`]
//! wraps it with per-key state under a single lock so check-and-record is
//! atomic across threads.

use crate::clock::{Clock, SystemClock};
use crate::config::AdmissionConfig;
use crate::error::{VaultError, VaultResult};
use crate::types::Timestamp;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::warn;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted.
    Admitted {
        /// Requests still admissible in the current window.
        remaining: u32,
    },
    /// Request rejected.
    Rejected {
        /// Milliseconds until the oldest admitted request leaves the window.
        retry_after_ms: u64,
    },
}

impl Admission {
    /// True when admitted.
    #[must_use]
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Decides whether one more request fits.
///
/// `log` holds admission times still inside the window, oldest first, and
/// must already be pruned to `(now - window, now]`.
#[must_use]
pub fn decide(log: &VecDeque<Timestamp>, now: Timestamp, max_requests: u32, window_ms: i64) -> Admission {
    let admitted = u32::try_from(log.len()).unwrap_or(u32::MAX);
    if admitted < max_requests {
        return Admission::Admitted {
            remaining: max_requests - admitted - 1,
        };
    }
    let retry_after = log
        .front()
        .map_or(window_ms, |oldest| oldest.saturating_add(window_ms).saturating_sub(now));
    Admission::Rejected {
        retry_after_ms: u64::try_from(retry_after).unwrap_or(0).max(1),
    }
}

/// Drops entries that fell out of the window ending at `now`.
fn prune(log: &mut VecDeque<Timestamp>, now: Timestamp, window_ms: i64) {
    let cutoff = now.saturating_sub(window_ms);
    while log.front().is_some_and(|&t| t <= cutoff) {
        log.pop_front();
    }
}

/// Per-key sliding-window limiter.
pub struct AdmissionControl {
    config: AdmissionConfig,
    clock: Arc<dyn Clock>,
    logs: Mutex<HashMap<String, VecDeque<Timestamp>>>,
}

impl AdmissionControl {
    /// Creates a limiter on the system clock.
    #[must_use]
    pub fn new(config: AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a limiter on the given clock.
    #[must_use]
    pub fn with_clock(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Checks and, when admitted, records one request for `key`.
    pub fn check(&self, key: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Admitted {
                remaining: self.config.max_requests,
            };
        }

        let now = self.clock.now_ms();
        let window_ms = self.window_ms();
        let mut logs = self.logs.lock();
        let log = logs.entry(key.to_string()).or_default();
        prune(log, now, window_ms);

        let admission = decide(log, now, self.config.max_requests, window_ms);
        match admission {
            Admission::Admitted { .. } => log.push_back(now),
            Admission::Rejected { retry_after_ms } => {
                warn!(key, retry_after_ms, "request rate limited");
            }
        }
        admission
    }

    /// Like [`AdmissionControl::check`], mapping rejection to `RateLimited`.
    pub fn admit(&self, key: &str) -> VaultResult<()> {
        match self.check(key) {
            Admission::Admitted { .. } => Ok(()),
            Admission::Rejected { retry_after_ms } => {
                Err(VaultError::RateLimited { retry_after_ms })
            }
        }
    }

    /// Removes keys whose windows are empty. Returns how many were dropped.
    pub fn prune_idle(&self) -> usize {
        let now = self.clock.now_ms();
        let window_ms = self.window_ms();
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|_, log| {
            prune(log, now, window_ms);
            !log.is_empty()
        });
        before - logs.len()
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.logs.lock().len()
    }
}

impl std::fmt::Debug for AdmissionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionControl")
            .field("config", &self.config)
            .field("tracked_keys", &self.tracked_keys())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    fn limiter(max: u32, window_ms: u64) -> (AdmissionControl, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let control = AdmissionControl::with_clock(
            AdmissionConfig::new(max, Duration::from_millis(window_ms)),
            clock.clone(),
        );
        (control, clock)
    }

    #[test]
    fn decide_is_pure() {
        let log: VecDeque<Timestamp> = [100, 200].into_iter().collect();
        assert_eq!(decide(&log, 250, 3, 1000), Admission::Admitted { remaining: 0 });
        assert_eq!(
            decide(&log, 250, 2, 1000),
            Admission::Rejected { retry_after_ms: 850 }
        );
    }

    #[test]
    fn retry_after_is_at_least_one() {
        let log: VecDeque<Timestamp> = [0].into_iter().collect();
        assert_eq!(
            decide(&log, 1000, 1, 1000),
            Admission::Rejected { retry_after_ms: 1 }
        );
    }

    #[test]
    fn admits_up_to_threshold_then_rejects() {
        let (control, clock) = limiter(3, 1_000);
        for _ in 0..3 {
            assert!(control.check("a").is_admitted());
            clock.advance(100);
        }
        assert_eq!(
            control.check("a"),
            Admission::Rejected { retry_after_ms: 700 }
        );
        assert_eq!(
            control.admit("a").unwrap_err().code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn window_slides() {
        let (control, clock) = limiter(2, 1_000);
        assert!(control.check("a").is_admitted());
        clock.advance(500);
        assert!(control.check("a").is_admitted());
        assert!(!control.check("a").is_admitted());

        clock.advance(500);
        assert!(control.check("a").is_admitted());
        assert!(!control.check("a").is_admitted());
    }

    #[test]
    fn rejections_are_not_recorded() {
        let (control, clock) = limiter(1, 1_000);
        assert!(control.check("a").is_admitted());
        for _ in 0..10 {
            clock.advance(50);
            control.check("a");
        }
        clock.set(11_000);
        assert!(control.check("a").is_admitted());
    }

    #[test]
    fn keys_are_independent() {
        let (control, _) = limiter(1, 1_000);
        assert!(control.check("a").is_admitted());
        assert!(control.check("b").is_admitted());
        assert!(!control.check("a").is_admitted());
    }

    #[test]
    fn disabled_admits_everything() {
        let control = AdmissionControl::new(AdmissionConfig::disabled());
        for _ in 0..1_000 {
            assert!(control.check("a").is_admitted());
        }
        assert_eq!(control.tracked_keys(), 0);
    }

    #[test]
    fn idle_keys_are_pruned() {
        let (control, clock) = limiter(5, 1_000);
        control.check("a");
        control.check("b");
        clock.advance(600);
        control.check("b");
        clock.advance(500);

        assert_eq!(control.prune_idle(), 1);
        assert_eq!(control.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_threshold() {
        let (control, _) = limiter(50, 60_000);
        let control = Arc::new(control);
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let control = Arc::clone(&control);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..20 {
                        if control.check("shared").is_admitted() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 50);
    }
}
