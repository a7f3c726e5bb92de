//! reqwest implementation of [`ActionsApi`] against the GitHub REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::link::parse_next_link;
use super::{ActionsApi, ApiError, RunPage};
use crate::config::{CollectorConfig, GitHubConfig};
use crate::model::{RunId, RunState, WorkflowRun};

const API_VERSION: &str = "2022-11-28";

/// Body of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Deserialize)]
struct RunsEnvelope {
    #[serde(default)]
    total_count: Option<u64>,
    workflow_runs: Vec<WorkflowRun>,
}

/// `reqwest`-backed [`ActionsApi`] bound to a single repository.
pub struct GitHubClient {
    http: Client,
    repo_url: String,
    per_page: u8,
    status_filter: Option<String>,
}

impl GitHubClient {
    pub fn new(github: &GitHubConfig, collector: &CollectorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = github.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("GitHub token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(github.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(github.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let status_filter = Some(collector.status_filter.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            http,
            repo_url: format!(
                "{}/repos/{}/{}",
                github.api_url.trim_end_matches('/'),
                github.owner,
                github.repo
            ),
            per_page: collector.per_page.clamp(1, 100),
            status_filter,
        })
    }

    fn run_url(&self, run_id: RunId) -> String {
        format!("{}/actions/runs/{}", self.repo_url, run_id)
    }
}

#[async_trait::async_trait]
impl ActionsApi for GitHubClient {
    async fn list_runs_page(&self, cursor: Option<&str>) -> Result<RunPage, ApiError> {
        let request = match cursor {
            // next links already carry the query string
            Some(next) => self.http.get(next),
            None => {
                let mut query = vec![("per_page", self.per_page.to_string())];
                if let Some(status) = &self.status_filter {
                    query.push(("status", status.clone()));
                }
                self.http
                    .get(format!("{}/actions/runs", self.repo_url))
                    .query(&query)
            }
        };
        let url = cursor
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/actions/runs", self.repo_url));

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(ApiError::UnexpectedStatus {
                method: "GET",
                url,
                status: response.status().as_u16(),
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body: RunsEnvelope = response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })?;
        debug!(
            runs = body.workflow_runs.len(),
            total = ?body.total_count,
            has_next = next.is_some(),
            "fetched run page"
        );

        Ok(RunPage {
            runs: body.workflow_runs,
            next,
        })
    }

    async fn rerun(&self, run_id: RunId) -> Result<(), ApiError> {
        let url = format!("{}/rerun", self.run_url(run_id));
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(ApiError::UnexpectedStatus {
                method: "POST",
                url,
                status: status.as_u16(),
            }),
        }
    }

    async fn run_state(&self, run_id: RunId) -> Result<RunState, ApiError> {
        let url = self.run_url(run_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::UnexpectedStatus {
                method: "GET",
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<RunState>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}
