//! GitHub Actions REST API access.
//!
//! [`ActionsApi`] is the seam between the rerun pipeline and the provider.
//! [`client::GitHubClient`] talks to the real API over `reqwest`; tests plug
//! in scripted implementations.

pub mod client;
pub mod link;

use thiserror::Error;

use crate::model::{RunId, RunState, WorkflowRun};

pub use client::GitHubClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status}")]
    UnexpectedStatus {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One page of the run listing.
#[derive(Debug, Clone, Default)]
pub struct RunPage {
    pub runs: Vec<WorkflowRun>,
    /// URL of the following page, taken from the `Link: rel="next"` header.
    pub next: Option<String>,
}

/// Operations the rerunner needs from the CI provider.
#[async_trait::async_trait]
pub trait ActionsApi: Send + Sync {
    /// Fetch a page of runs. `None` requests the first page; `Some(url)`
    /// follows a `next` link returned by a previous call.
    async fn list_runs_page(&self, cursor: Option<&str>) -> Result<RunPage, ApiError>;

    /// Ask the provider to re-run a run. Only `201 Created` counts as success.
    async fn rerun(&self, run_id: RunId) -> Result<(), ApiError>;

    /// Current status and conclusion of a run.
    async fn run_state(&self, run_id: RunId) -> Result<RunState, ApiError>;
}
