//! Retry-eligibility policy.
//!
//! GitHub refuses to re-run a cancelled run once it is older than a week, so
//! such runs are filtered out both at collection time and again right before
//! the rerun request goes out.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Conclusion, WorkflowRun};

/// Default age after which a cancelled run can no longer be re-run.
pub const DEFAULT_CANCELLED_MAX_AGE_DAYS: i64 = 7;

/// Largest max age accepted from configuration (about a century).
pub const MAX_CANCELLED_MAX_AGE_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    pub cancelled_max_age: Duration,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::with_max_age_days(DEFAULT_CANCELLED_MAX_AGE_DAYS)
    }
}

impl EligibilityPolicy {
    /// Day counts too large for a `Duration` saturate, so nothing expires.
    pub fn with_max_age_days(days: i64) -> Self {
        Self {
            cancelled_max_age: Duration::try_days(days).unwrap_or(Duration::MAX),
        }
    }

    /// True iff the run was cancelled and is strictly older than the max age.
    pub fn is_expired_cancellation(&self, run: &WorkflowRun, now: DateTime<Utc>) -> bool {
        matches!(run.conclusion, Some(Conclusion::Cancelled))
            && run.age(now) > self.cancelled_max_age
    }

    /// Runs that concluded in failure or cancellation, regardless of age.
    pub fn is_rerun_candidate(&self, run: &WorkflowRun) -> bool {
        matches!(
            run.conclusion,
            Some(Conclusion::Failure) | Some(Conclusion::Cancelled)
        )
    }

    pub fn is_eligible(&self, run: &WorkflowRun, now: DateTime<Utc>) -> bool {
        self.is_rerun_candidate(run) && !self.is_expired_cancellation(run, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunId, RunStatus};

    fn run(conclusion: Option<Conclusion>, created_at: DateTime<Utc>) -> WorkflowRun {
        WorkflowRun {
            id: RunId(1),
            created_at,
            status: RunStatus::Completed,
            conclusion,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_cancelled_older_than_threshold_is_expired() {
        let policy = EligibilityPolicy::default();
        let now = Utc::now();
        let r = run(Some(Conclusion::Cancelled), now - Duration::days(10));

        assert!(policy.is_expired_cancellation(&r, now));
        assert!(!policy.is_eligible(&r, now));
    }

    #[test]
    fn test_cancelled_within_threshold_is_eligible() {
        let policy = EligibilityPolicy::default();
        let now = Utc::now();
        let r = run(Some(Conclusion::Cancelled), now - Duration::days(3));

        assert!(!policy.is_expired_cancellation(&r, now));
        assert!(policy.is_eligible(&r, now));
    }

    #[test]
    fn test_cancelled_exactly_at_threshold_is_eligible() {
        let policy = EligibilityPolicy::default();
        let now = Utc::now();
        let r = run(Some(Conclusion::Cancelled), now - Duration::days(7));
        assert!(policy.is_eligible(&r, now));

        let just_over = run(
            Some(Conclusion::Cancelled),
            now - Duration::days(7) - Duration::seconds(1),
        );
        assert!(!policy.is_eligible(&just_over, now));
    }

    #[test]
    fn test_failure_is_eligible_at_any_age() {
        let policy = EligibilityPolicy::default();
        let now = Utc::now();
        for days in [0, 3, 7, 30, 400] {
            let r = run(Some(Conclusion::Failure), now - Duration::days(days));
            assert!(!policy.is_expired_cancellation(&r, now));
            assert!(policy.is_eligible(&r, now), "failure aged {days}d");
        }
    }

    #[test]
    fn test_other_conclusions_are_never_candidates() {
        let policy = EligibilityPolicy::default();
        let now = Utc::now();
        for c in [
            Some(Conclusion::Success),
            Some(Conclusion::Skipped),
            Some(Conclusion::TimedOut),
            Some(Conclusion::Other("startup_failure".into())),
            None,
        ] {
            let r = run(c, now - Duration::days(1));
            assert!(!policy.is_rerun_candidate(&r));
            assert!(!policy.is_eligible(&r, now));
        }
    }

    #[test]
    fn test_huge_max_age_saturates_instead_of_panicking() {
        let policy = EligibilityPolicy::with_max_age_days(i64::MAX);
        assert_eq!(policy.cancelled_max_age, Duration::MAX);

        let now = Utc::now();
        let r = run(Some(Conclusion::Cancelled), now - Duration::days(10_000));
        assert!(policy.is_eligible(&r, now));
    }

    #[test]
    fn test_custom_max_age() {
        let policy = EligibilityPolicy::with_max_age_days(2);
        let now = Utc::now();
        let r = run(Some(Conclusion::Cancelled), now - Duration::days(3));
        assert!(policy.is_expired_cancellation(&r, now));
    }
}
