//! Per-user API quota and the rolling-window decision.
//!
//! The decision is kept as a pure function so that every store applies the
//! exact same rules:
//! - a window older than [`QUOTA_WINDOW_DAYS`] always grants the request and
//!   restarts the count at 1,
//! - otherwise the request is refused only when `request_used > max_requests`
//!   (usage equal to the limit still passes).

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Length of the quota window in days.
pub const QUOTA_WINDOW_DAYS: i64 = 30;

/// Quota record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApiQuota {
    /// Owning user
    pub user_id: String,
    /// Bearer credential for the API
    pub secret_key: String,
    /// Requests allowed per window
    pub max_requests: i32,
    /// Requests consumed in the current window
    pub request_used: i32,
    /// Start of the current window
    pub last_reset_date: DateTime<Utc>,
}

impl ApiQuota {
    /// Create a fresh quota with an empty window starting now.
    pub fn new(
        user_id: impl Into<String>,
        secret_key: impl Into<String>,
        max_requests: i32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            secret_key: secret_key.into(),
            max_requests,
            request_used: 0,
            last_reset_date: Utc::now(),
        }
    }

    /// Length of the quota window.
    pub fn window() -> Duration {
        Duration::days(QUOTA_WINDOW_DAYS)
    }

    /// Whether the window has expired at `now`.
    pub fn window_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_reset_date >= Self::window()
    }

    /// When the current window ends.
    pub fn window_resets_at(&self) -> DateTime<Utc> {
        self.last_reset_date + Self::window()
    }

    /// Requests left in the current window (never negative).
    pub fn remaining(&self, now: DateTime<Utc>) -> i32 {
        if self.window_expired(now) {
            self.max_requests
        } else {
            (self.max_requests - self.request_used).max(0)
        }
    }
}

/// Outcome of evaluating a quota at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Window expired; the request is granted and opens a new window.
    WindowReset,
    /// Within the window and under (or at) the limit.
    Allowed,
    /// Within the window and over the limit.
    Exhausted,
}

impl QuotaDecision {
    /// Evaluate a quota at `now`.
    pub fn evaluate(quota: &ApiQuota, now: DateTime<Utc>) -> Self {
        if quota.window_expired(now) {
            QuotaDecision::WindowReset
        } else if quota.request_used > quota.max_requests {
            QuotaDecision::Exhausted
        } else {
            QuotaDecision::Allowed
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, QuotaDecision::Exhausted)
    }

    /// Apply a consuming request to `quota`.
    ///
    /// Returns `false` (and leaves the quota untouched) for `Exhausted`.
    pub fn consume(&self, quota: &mut ApiQuota, now: DateTime<Utc>) -> bool {
        match self {
            QuotaDecision::WindowReset => {
                quota.request_used = 1;
                quota.last_reset_date = now;
                true
            }
            QuotaDecision::Allowed => {
                quota.request_used += 1;
                true
            }
            QuotaDecision::Exhausted => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(max: i32, used: i32, age_days: i64, now: DateTime<Utc>) -> ApiQuota {
        ApiQuota {
            user_id: "user-1".into(),
            secret_key: "sk_test".into(),
            max_requests: max,
            request_used: used,
            last_reset_date: now - Duration::days(age_days),
        }
    }

    #[test]
    fn test_expired_window_resets_regardless_of_usage() {
        let now = Utc::now();
        for used in [0, 99, 100, 5000] {
            let mut q = quota(100, used, 30, now);
            let decision = QuotaDecision::evaluate(&q, now);
            assert_eq!(decision, QuotaDecision::WindowReset);
            assert!(decision.consume(&mut q, now));
            assert_eq!(q.request_used, 1);
            assert_eq!(q.last_reset_date, now);
        }
    }

    #[test]
    fn test_window_boundary_is_inclusive_at_thirty_days() {
        let now = Utc::now();
        let mut q = quota(10, 3, 0, now);
        q.last_reset_date = now - Duration::days(30) + Duration::seconds(1);
        assert_eq!(QuotaDecision::evaluate(&q, now), QuotaDecision::Allowed);
        q.last_reset_date = now - Duration::days(30);
        assert_eq!(QuotaDecision::evaluate(&q, now), QuotaDecision::WindowReset);
    }

    #[test]
    fn test_usage_equal_to_limit_is_allowed() {
        let now = Utc::now();
        let mut q = quota(100, 100, 1, now);
        let decision = QuotaDecision::evaluate(&q, now);
        assert_eq!(decision, QuotaDecision::Allowed);
        assert!(decision.consume(&mut q, now));
        assert_eq!(q.request_used, 101);
    }

    #[test]
    fn test_usage_over_limit_is_refused_without_mutation() {
        let now = Utc::now();
        let mut q = quota(100, 101, 1, now);
        let before = q.clone();
        let decision = QuotaDecision::evaluate(&q, now);
        assert_eq!(decision, QuotaDecision::Exhausted);
        assert!(!decision.consume(&mut q, now));
        assert_eq!(q, before);
    }

    #[test]
    fn test_remaining() {
        let now = Utc::now();
        assert_eq!(quota(10, 4, 1, now).remaining(now), 6);
        assert_eq!(quota(10, 12, 1, now).remaining(now), 0);
        assert_eq!(quota(10, 12, 31, now).remaining(now), 10);
    }
}
