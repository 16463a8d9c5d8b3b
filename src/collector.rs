//! Orchestrates a full collection run for one repository.
//!
//! `MetricsCollector` fetches the merged pull request list once, then fans the
//! per-PR extraction out over a bounded pool of concurrent workers. A failing
//! pull request is logged and left out; it never aborts the batch.

use crate::config::{AppConfig, RepoId};
use crate::fetcher;
use crate::github::GitHubClient;
use crate::metrics::MetricsRecord;
use crate::types::PullRequestSummary;
use futures::stream::{self, StreamExt};

#[derive(Clone)]
pub struct MetricsCollector {
    client: GitHubClient,
    repo: RepoId,
    max_requests: usize,
    worker_count: usize,
}

impl MetricsCollector {
    /// Initializes a new MetricsCollector, including its GitHub client.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: GitHubClient::new(config)?,
            repo: config.github_repo.clone(),
            max_requests: config.max_requests,
            worker_count: config.worker_count,
        })
    }

    /// Fetches the merged pull requests and extracts a record for each of them.
    pub async fn run(&self) -> anyhow::Result<Vec<MetricsRecord>> {
        let prs = self.fetch_pull_requests().await?;
        Ok(self.collect(&prs).await)
    }

    /// Retrieves the merged pull requests of the configured repository.
    pub async fn fetch_pull_requests(&self) -> anyhow::Result<Vec<PullRequestSummary>> {
        let prs = self
            .client
            .fetch_merged_pull_requests(&self.repo, self.max_requests)
            .await?;
        tracing::info!(repo = %self.repo, count = prs.len(), "Fetched merged pull requests");
        Ok(prs)
    }

    /// Extracts a record per pull request, at most `worker_count` at a time.
    ///
    /// Records arrive in completion order, not in the order of `prs`.
    pub async fn collect(&self, prs: &[PullRequestSummary]) -> Vec<MetricsRecord> {
        stream::iter(prs)
            .map(|pr| async move {
                let result = fetcher::extract_metrics(&self.client, &self.repo, pr.number).await;
                (pr.number, result)
            })
            .buffer_unordered(self.worker_count)
            .filter_map(|(pr_number, result)| async move {
                match result {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::error!(pr = pr_number, "PR {} generated an error: {:#}", pr_number, e);
                        None
                    }
                }
            })
            .collect()
            .await
    }
}
