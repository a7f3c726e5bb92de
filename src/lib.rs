//! workflow-rerunner -- re-trigger failed and cancelled GitHub Actions runs.
//!
//! A pass has three stages: the [`collector`] lists the repository's runs and
//! keeps the ones the [`policy`] allows to be re-run, writes them to a
//! [`snapshot`], and the [`driver`] re-triggers each one and polls it until it
//! finishes.

pub mod collector;
pub mod config;
pub mod driver;
pub mod github;
pub mod model;
pub mod policy;
pub mod snapshot;

use chrono::Utc;

use crate::config::RerunnerConfig;
use crate::driver::{RerunDriver, RerunReport};
use crate::github::ActionsApi;

/// Collect eligible runs, then rerun and monitor each of them.
///
/// Collection failures surface as an empty report list.
pub async fn run_with<A>(api: &A, config: &RerunnerConfig) -> Vec<RerunReport>
where
    A: ActionsApi + ?Sized,
{
    let policy = config.policy.policy();
    tracing::info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        "collecting failed and cancelled workflow runs"
    );
    let runs = collector::collect(api, &policy, Utc::now(), &config.collector.snapshot_path).await;

    RerunDriver::new(api, policy, config.polling.clone())
        .drive(&runs)
        .await
}
