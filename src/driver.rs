//! Rerun driver: re-trigger eligible runs one at a time and watch each until
//! it reaches a terminal state.
//!
//! Polling is bounded. A run that never reports `completed` ends as
//! [`RerunOutcome::TimedOut`], and repeated failed status checks end it as
//! [`RerunOutcome::StatusUnavailable`] instead of being read as "still running".

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::PollingConfig;
use crate::github::ActionsApi;
use crate::model::{Conclusion, RunId, RunStatus, WorkflowRun};
use crate::policy::EligibilityPolicy;

/// Terminal state of one run as seen by the driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RerunOutcome {
    /// Cancelled run aged out of the rerun window before it was reached.
    Expired,
    /// The provider did not answer the rerun request with `201 Created`.
    RerunRejected { error: String },
    Completed { conclusion: Option<Conclusion> },
    TimedOut { last_status: Option<RunStatus> },
    StatusUnavailable { error: String },
}

impl RerunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RerunOutcome::Expired => "expired",
            RerunOutcome::RerunRejected { .. } => "rerun-rejected",
            RerunOutcome::Completed { .. } => "completed",
            RerunOutcome::TimedOut { .. } => "timed-out",
            RerunOutcome::StatusUnavailable { .. } => "status-unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerunReport {
    pub run_id: RunId,
    pub name: Option<String>,
    pub outcome: RerunOutcome,
    /// Status checks issued for this run.
    pub polls: u32,
}

pub struct RerunDriver<'a, A: ?Sized> {
    api: &'a A,
    policy: EligibilityPolicy,
    polling: PollingConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<'a, A> RerunDriver<'a, A>
where
    A: ActionsApi + ?Sized,
{
    pub fn new(api: &'a A, policy: EligibilityPolicy, polling: PollingConfig) -> Self {
        Self {
            api,
            policy,
            polling,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used by the pre-rerun eligibility guard.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Process `runs` sequentially, in the order given.
    pub async fn drive(&self, runs: &[WorkflowRun]) -> Vec<RerunReport> {
        if runs.is_empty() {
            info!("there are currently no workflow runs that need to be rerun");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(runs.len());
        for run in runs {
            reports.push(self.drive_one(run).await);
        }
        reports
    }

    pub async fn drive_one(&self, run: &WorkflowRun) -> RerunReport {
        let report = |outcome, polls| RerunReport {
            run_id: run.id,
            name: run.name().map(str::to_string),
            outcome,
            polls,
        };

        if self.policy.is_expired_cancellation(run, (self.clock)()) {
            info!(run_id = %run.id, "skipping run: cancelled and past the rerun window");
            return report(RerunOutcome::Expired, 0);
        }

        if let Err(e) = self.api.rerun(run.id).await {
            warn!(run_id = %run.id, error = %e, "failed to rerun workflow run");
            return report(RerunOutcome::RerunRejected { error: e.to_string() }, 0);
        }
        info!(run_id = %run.id, "workflow run has been rerun");

        let (outcome, polls) = self.watch(run.id).await;
        report(outcome, polls)
    }

    /// Poll a freshly re-triggered run until it completes or a bound is hit.
    pub async fn watch(&self, run_id: RunId) -> (RerunOutcome, u32) {
        let deadline = deadline_after(self.polling.timeout());
        let interval = self.polling.interval();
        let mut polls = 0u32;
        let mut failures = 0u32;
        let mut last_status = None;

        sleep(self.polling.initial_delay()).await;

        loop {
            polls += 1;
            match self.api.run_state(run_id).await {
                Ok(state) => {
                    failures = 0;
                    info!(
                        run_id = %run_id,
                        status = %state.status,
                        conclusion = ?state.conclusion.as_ref().map(Conclusion::as_str),
                        "workflow run status"
                    );
                    if state.status.is_completed() {
                        return (
                            RerunOutcome::Completed {
                                conclusion: state.conclusion,
                            },
                            polls,
                        );
                    }
                    last_status = Some(state.status);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        run_id = %run_id,
                        error = %e,
                        failures,
                        max = self.polling.max_status_failures,
                        "failed to retrieve workflow run status"
                    );
                    if failures >= self.polling.max_status_failures {
                        return (
                            RerunOutcome::StatusUnavailable {
                                error: e.to_string(),
                            },
                            polls,
                        );
                    }
                }
            }

            if deadline_after(interval) > deadline {
                warn!(run_id = %run_id, status = ?last_status, "gave up waiting for workflow run to complete");
                return (RerunOutcome::TimedOut { last_status }, polls);
            }
            sleep(interval).await;
        }
    }
}

/// `now + wait`, saturating to a far-future instant instead of overflowing.
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
