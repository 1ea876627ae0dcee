//! Failed-attempt tracking and time-boxed lockout.

use chrono::{DateTime, Duration, Utc};

/// Lockout policy configuration.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failed attempts tolerated before the lock engages.
    pub max_attempts: u32,
    /// How long login stays refused once locked.
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(5),
        }
    }
}

impl LockoutPolicy {
    /// Override the attempt threshold.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the lockout window.
    #[must_use]
    pub fn with_lockout_duration(mut self, lockout_duration: Duration) -> Self {
        self.lockout_duration = lockout_duration;
        self
    }
}

/// Process-local failed-attempt tracker.
///
/// Not persisted across restarts. Every method takes the caller's `now` so a
/// single time source serves both the lock decision and the remaining-window
/// computation within one check.
#[derive(Debug, Clone, Default)]
pub struct LockoutTracker {
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

impl LockoutTracker {
    /// Create a fresh tracker with no recorded failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures recorded since the last reset.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Time left in the lockout window, if a lock is in effect at `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.locked_until {
            Some(until) if until > now => Some(until - now),
            _ => None,
        }
    }

    /// Whether a lock is in effect at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_some()
    }

    /// Drop an elapsed lock and its counter.
    ///
    /// The window satisfies the lock; the next attempt starts from zero.
    pub fn clear_if_expired(&mut self, now: DateTime<Utc>) {
        if let Some(until) = self.locked_until
            && until <= now
        {
            self.failed_attempts = 0;
            self.locked_until = None;
        }
    }

    /// Record a rejected attempt, engaging the lock at the threshold.
    ///
    /// Returns the remaining window when this failure tripped (or extended
    /// into) a lock.
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> Option<Duration> {
        self.failed_attempts += 1;
        if self.failed_attempts >= policy.max_attempts {
            self.locked_until = Some(now + policy.lockout_duration);
        }
        self.remaining(now)
    }

    /// Reset after a successful authentication.
    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifth_failure_engages_full_window() {
        let policy = LockoutPolicy::default();
        let mut tracker = LockoutTracker::new();
        let now = Utc::now();

        for _ in 0..4 {
            assert_eq!(tracker.record_failure(now, &policy), None);
        }
        let remaining = tracker.record_failure(now, &policy).unwrap();
        assert_eq!(remaining, policy.lockout_duration);
        assert!(tracker.is_locked(now));
    }

    #[test]
    fn remaining_shrinks_as_time_passes() {
        let policy = LockoutPolicy::default();
        let mut tracker = LockoutTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure(now, &policy);
        }

        let later = now + Duration::minutes(2);
        let remaining = tracker.remaining(later).unwrap();
        assert_eq!(remaining, Duration::minutes(3));
    }

    #[test]
    fn elapsed_window_clears_lock_and_counter() {
        let policy = LockoutPolicy::default();
        let mut tracker = LockoutTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure(now, &policy);
        }

        let after = now + policy.lockout_duration + Duration::seconds(1);
        assert!(!tracker.is_locked(after));
        tracker.clear_if_expired(after);
        assert_eq!(tracker.failed_attempts(), 0);
        assert_eq!(tracker.remaining(after), None);
    }

    #[test]
    fn clear_if_expired_leaves_active_lock_alone() {
        let policy = LockoutPolicy::default();
        let mut tracker = LockoutTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure(now, &policy);
        }

        tracker.clear_if_expired(now + Duration::minutes(1));
        assert!(tracker.is_locked(now + Duration::minutes(1)));
        assert_eq!(tracker.failed_attempts(), 5);
    }

    #[test]
    fn reset_clears_everything() {
        let policy = LockoutPolicy::default().with_max_attempts(2);
        let mut tracker = LockoutTracker::new();
        let now = Utc::now();
        tracker.record_failure(now, &policy);
        tracker.record_failure(now, &policy);
        assert!(tracker.is_locked(now));

        tracker.reset();
        assert!(!tracker.is_locked(now));
        assert_eq!(tracker.failed_attempts(), 0);
    }
}
