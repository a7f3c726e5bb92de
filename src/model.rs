//! Workflow-run records as returned by the GitHub Actions API.
//!
//! Only the fields the rerunner reasons about are typed. Everything else the
//! provider sends is kept in [`WorkflowRun::extra`] so a snapshot written back
//! to disk carries the original object untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque provider-assigned run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle status of a run.
///
/// Values the provider adds later are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Requested => "requested",
            RunStatus::Queued => "queued",
            RunStatus::Pending => "pending",
            RunStatus::Waiting => "waiting",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Other(s) => s,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "requested" => RunStatus::Requested,
            "queued" => RunStatus::Queued,
            "pending" => RunStatus::Pending,
            "waiting" => RunStatus::Waiting,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of a completed run. Absent (`null`) while the run is still going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Neutral,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    Other(String),
}

impl Conclusion {
    pub fn as_str(&self) -> &str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Neutral => "neutral",
            Conclusion::Skipped => "skipped",
            Conclusion::TimedOut => "timed_out",
            Conclusion::ActionRequired => "action_required",
            Conclusion::Stale => "stale",
            Conclusion::Other(s) => s,
        }
    }
}

impl From<String> for Conclusion {
    fn from(s: String) -> Self {
        match s.as_str() {
            "success" => Conclusion::Success,
            "failure" => Conclusion::Failure,
            "cancelled" => Conclusion::Cancelled,
            "neutral" => Conclusion::Neutral,
            "skipped" => Conclusion::Skipped,
            "timed_out" => Conclusion::TimedOut,
            "action_required" => Conclusion::ActionRequired,
            "stale" => Conclusion::Stale,
            _ => Conclusion::Other(s),
        }
    }
}

impl From<Conclusion> for String {
    fn from(conclusion: Conclusion) -> Self {
        match conclusion {
            Conclusion::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    /// Remaining provider fields (name, head_branch, html_url, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowRun {
    /// Workflow name, when the provider sent one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(|v| v.as_str())
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Current state of a run as reported by the single-run endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_run_object() {
        let json = r#"{
            "id": 30433642,
            "name": "Build",
            "head_branch": "main",
            "status": "completed",
            "conclusion": "cancelled",
            "created_at": "2024-01-05T10:00:00Z",
            "run_attempt": 1
        }"#;

        let run: WorkflowRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.id, RunId(30433642));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.conclusion, Some(Conclusion::Cancelled));
        assert_eq!(run.name(), Some("Build"));
        assert_eq!(run.extra["run_attempt"], 1);
        assert_eq!(run.created_at.to_rfc3339(), "2024-01-05T10:00:00+00:00");
    }

    #[test]
    fn test_null_conclusion_while_running() {
        let json = r#"{"id": 1, "status": "in_progress", "conclusion": null,
                       "created_at": "2024-01-05T10:00:00Z"}"#;
        let run: WorkflowRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(run.conclusion.is_none());
        assert!(!run.status.is_completed());
    }

    #[test]
    fn test_unknown_values_are_preserved() {
        let json = r#"{"id": 7, "status": "brand_new_state", "conclusion": "startup_failure",
                       "created_at": "2024-01-05T10:00:00Z"}"#;
        let run: WorkflowRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.status, RunStatus::Other("brand_new_state".into()));
        assert_eq!(run.conclusion, Some(Conclusion::Other("startup_failure".into())));

        let back = serde_json::to_value(&run).unwrap();
        assert_eq!(back["status"], "brand_new_state");
        assert_eq!(back["conclusion"], "startup_failure");
    }

    #[test]
    fn test_run_state_ignores_other_fields() {
        let json = r#"{"id": 9, "status": "queued", "conclusion": null, "html_url": "x"}"#;
        let state: RunState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status, RunStatus::Queued);
        assert_eq!(state.conclusion, None);
    }
}
