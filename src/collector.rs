//! Collection pass: list runs, keep the ones worth re-running, snapshot them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::github::ActionsApi;
use crate::model::WorkflowRun;
use crate::policy::EligibilityPolicy;
use crate::snapshot;

/// Walk every page of the run listing and return the eligible runs in
/// retrieval order, then overwrite the snapshot at `snapshot_path`.
pub async fn try_collect<A>(
    api: &A,
    policy: &EligibilityPolicy,
    now: DateTime<Utc>,
    snapshot_path: &Path,
) -> Result<Vec<WorkflowRun>>
where
    A: ActionsApi + ?Sized,
{
    let mut eligible = Vec::new();
    let mut seen_runs = HashSet::new();
    let mut seen_pages = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = api
            .list_runs_page(cursor.as_deref())
            .await
            .context("failed to retrieve workflow runs")?;
        info!(runs = page.runs.len(), "retrieved workflow runs");

        for run in page.runs {
            if !policy.is_rerun_candidate(&run) {
                continue;
            }
            if policy.is_expired_cancellation(&run, now) {
                info!(run_id = %run.id, created_at = %run.created_at, "skipping cancelled run older than the rerun window");
                continue;
            }
            // listings shift while new runs land, so a run can show up twice
            if !seen_runs.insert(run.id) {
                debug!(run_id = %run.id, "run already collected from an earlier page");
                continue;
            }
            eligible.push(run);
        }

        match page.next {
            Some(next) if seen_pages.insert(next.clone()) => cursor = Some(next),
            Some(next) => {
                debug!(%next, "next link already visited, stopping pagination");
                break;
            }
            None => break,
        }
    }

    snapshot::write(snapshot_path, &eligible)?;
    Ok(eligible)
}

/// Like [`try_collect`], but a failed pass is logged and reported as no runs.
pub async fn collect<A>(
    api: &A,
    policy: &EligibilityPolicy,
    now: DateTime<Utc>,
    snapshot_path: &Path,
) -> Vec<WorkflowRun>
where
    A: ActionsApi + ?Sized,
{
    match try_collect(api, policy, now, snapshot_path).await {
        Ok(runs) => runs,
        Err(e) => {
            error!(error = %format!("{e:#}"), "collection failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{ApiError, RunPage};
    use crate::model::{Conclusion, RunId, RunState, RunStatus};
    use chrono::Duration;
    use std::sync::Mutex;

    /// Serves a fixed list of pages linked by `page-N` cursors.
    struct PagedApi {
        pages: Vec<Vec<WorkflowRun>>,
        fail_on_page: Option<usize>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedApi {
        fn new(pages: Vec<Vec<WorkflowRun>>) -> Self {
            Self {
                pages,
                fail_on_page: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ActionsApi for PagedApi {
        async fn list_runs_page(&self, cursor: Option<&str>) -> Result<RunPage, ApiError> {
            self.requested.lock().unwrap().push(cursor.map(str::to_string));
            let index = match cursor {
                None => 0,
                Some(c) => c.trim_start_matches("page-").parse::<usize>().unwrap(),
            };
            if self.fail_on_page == Some(index) {
                return Err(ApiError::UnexpectedStatus {
                    method: "GET",
                    url: format!("page-{index}"),
                    status: 502,
                });
            }
            let next = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
            Ok(RunPage {
                runs: self.pages[index].clone(),
                next,
            })
        }

        async fn rerun(&self, _run_id: RunId) -> Result<(), ApiError> {
            unreachable!("collector never reruns")
        }

        async fn run_state(&self, _run_id: RunId) -> Result<RunState, ApiError> {
            unreachable!("collector never polls")
        }
    }

    fn run(id: u64, conclusion: Conclusion, age_days: i64, now: DateTime<Utc>) -> WorkflowRun {
        WorkflowRun {
            id: RunId(id),
            created_at: now - Duration::days(age_days),
            status: RunStatus::Completed,
            conclusion: Some(conclusion),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_follows_every_next_link_in_order() {
        let now = Utc::now();
        let api = PagedApi::new(vec![
            vec![run(1, Conclusion::Failure, 1, now), run(2, Conclusion::Cancelled, 1, now)],
            vec![run(3, Conclusion::Failure, 2, now)],
            vec![run(4, Conclusion::Cancelled, 2, now), run(5, Conclusion::Failure, 40, now)],
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");

        let runs = try_collect(&api, &EligibilityPolicy::default(), now, &path)
            .await
            .unwrap();

        let ids: Vec<u64> = runs.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            *api.requested.lock().unwrap(),
            vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_filters_conclusions_and_expired_cancellations() {
        let now = Utc::now();
        let api = PagedApi::new(vec![vec![
            run(1, Conclusion::Success, 1, now),
            run(2, Conclusion::Cancelled, 10, now),
            run(3, Conclusion::Cancelled, 3, now),
            run(4, Conclusion::Failure, 10, now),
            run(5, Conclusion::Skipped, 1, now),
        ]]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");

        let runs = collect(&api, &EligibilityPolicy::default(), now, &path).await;

        let ids: Vec<u64> = runs.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(snapshot::read(&path).unwrap(), runs);
    }

    #[tokio::test]
    async fn test_duplicate_runs_across_pages_are_dropped() {
        let now = Utc::now();
        let api = PagedApi::new(vec![
            vec![run(1, Conclusion::Failure, 1, now), run(2, Conclusion::Failure, 1, now)],
            vec![run(2, Conclusion::Failure, 1, now), run(3, Conclusion::Failure, 1, now)],
        ]);
        let dir = tempfile::tempdir().unwrap();

        let runs = collect(&api, &EligibilityPolicy::default(), now, &dir.path().join("s.json")).await;
        let ids: Vec<u64> = runs.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_mid_pagination_yields_nothing_and_no_snapshot() {
        let now = Utc::now();
        let mut api = PagedApi::new(vec![
            vec![run(1, Conclusion::Failure, 1, now)],
            vec![run(2, Conclusion::Failure, 1, now)],
        ]);
        api.fail_on_page = Some(1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");

        assert!(try_collect(&api, &EligibilityPolicy::default(), now, &path).await.is_err());
        let runs = collect(&api, &EligibilityPolicy::default(), now, &path).await;
        assert!(runs.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_fails_the_pass() {
        let now = Utc::now();
        let api = PagedApi::new(vec![vec![run(1, Conclusion::Failure, 1, now)]]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("snap.json");

        let runs = collect(&api, &EligibilityPolicy::default(), now, &path).await;
        assert!(runs.is_empty());
    }
}
