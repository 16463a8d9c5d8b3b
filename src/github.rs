use crate::config::{AppConfig, RepoId};
use crate::rate_limit::RateLimitGuard;
use crate::types::{CheckRunList, Comment, PullRequestDetail, PullRequestSummary, Review};
use anyhow::{Context, Result};
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration as StdDuration;

#[derive(Serialize)]
struct ListParams {
    state: &'static str,
    per_page: u8,
    sort: &'static str,
    direction: &'static str,
}

const CLOSED_BY_RECENT_UPDATE: ListParams = ListParams {
    state: "closed",
    per_page: 100,
    sort: "updated",
    direction: "desc",
};

/// Error payload GitHub attaches to non-success responses.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Extracts the `message` of a GitHub error body, if the body carries one.
fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|error| error.message)
}

/// Read-only access to the GitHub endpoints the metrics are built from.
///
/// Every call first passes through the [`RateLimitGuard`]. The list and detail fetchers
/// fail on a non-success status; the comment, review and check-run fetchers substitute
/// an empty result instead so a record can still be built from partial data.
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    rate_limit: RateLimitGuard,
    request_timeout: StdDuration,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(config.github_token.clone());
        if let Some(url) = &config.github_api_url {
            builder = builder
                .base_uri(url.as_str())
                .with_context(|| format!("invalid GitHub API URL '{url}'"))?;
        }
        let octocrab = builder.build()?;
        let request_timeout = config.request_timeout();

        Ok(Self {
            rate_limit: RateLimitGuard::new(octocrab.clone(), request_timeout),
            octocrab,
            request_timeout,
        })
    }

    /// Lists closed pull requests, most recently updated first, and keeps the merged ones.
    ///
    /// Pages are followed until the API runs out or `max_requests` entries have been
    /// gathered. The result never holds more than `max_requests` pull requests.
    pub async fn fetch_merged_pull_requests(
        &self,
        repo: &RepoId,
        max_requests: usize,
    ) -> Result<Vec<PullRequestSummary>> {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.repo);
        let mut prs = Vec::new();

        self.rate_limit.await_quota().await?;
        let first_page: Page<PullRequestSummary> = self
            .timed(self.octocrab.get(&route, Some(&CLOSED_BY_RECENT_UPDATE)))
            .await?
            .with_context(|| format!("failed to list pull requests for {repo}"))?;

        let mut next_page = Some(first_page);
        let mut page_count = 0;

        while let Some(mut page) = next_page.take() {
            if page.items.is_empty() {
                break;
            }
            page_count += 1;
            let next = page.next.take();
            prs.append(&mut page.items);
            tracing::debug!(repo = %repo, page = page_count, total = prs.len(), "Fetched pull request page");

            if prs.len() >= max_requests || next.is_none() {
                break;
            }

            self.rate_limit.await_quota().await?;
            next_page = self
                .timed(self.octocrab.get_page::<PullRequestSummary>(&next))
                .await?
                .with_context(|| format!("failed to list pull requests for {repo}"))?;
        }

        prs.retain(PullRequestSummary::is_merged);
        prs.truncate(max_requests);

        Ok(prs)
    }

    pub async fn fetch_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequestDetail> {
        let route = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.repo, number);

        self.rate_limit.await_quota().await?;
        self.timed(self.octocrab.get(&route, None::<&()>))
            .await?
            .with_context(|| format!("failed to fetch pull request #{number}"))
    }

    pub async fn fetch_issue_comments(&self, repo: &RepoId, number: u64) -> Result<Vec<Comment>> {
        let route = format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.repo, number);
        self.get_or_default(&route).await
    }

    pub async fn fetch_review_comments(&self, repo: &RepoId, number: u64) -> Result<Vec<Comment>> {
        let route = format!("/repos/{}/{}/pulls/{}/comments", repo.owner, repo.repo, number);
        self.get_or_default(&route).await
    }

    pub async fn fetch_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<Review>> {
        let route = format!("/repos/{}/{}/pulls/{}/reviews", repo.owner, repo.repo, number);
        self.get_or_default(&route).await
    }

    /// Fetches the CI check runs recorded against a commit.
    pub async fn fetch_check_runs(&self, repo: &RepoId, commit_sha: &str) -> Result<CheckRunList> {
        let route = format!(
            "/repos/{}/{}/commits/{}/check-runs",
            repo.owner, repo.repo, commit_sha
        );
        self.get_or_default(&route).await
    }

    /// GETs `route`, substituting `T::default()` when GitHub answers with a non-success
    /// status. Transport failures, timeouts and undecodable bodies still propagate.
    async fn get_or_default<T>(&self, route: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        self.rate_limit.await_quota().await?;

        let response = self
            .timed(self.octocrab._get(route))
            .await?
            .with_context(|| format!("GET {route} failed"))?;

        let status = response.status();
        if !status.is_success() {
            // The body only feeds the log line; failing to read it keeps the fetch degraded.
            let message = match self.timed(self.octocrab.body_to_string(response)).await {
                Ok(Ok(body)) => api_error_message(&body),
                _ => None,
            };
            tracing::warn!(
                route,
                status = %status,
                api_message = message.as_deref().unwrap_or("<no message>"),
                "GitHub request failed, using empty result"
            );
            return Ok(T::default());
        }

        let body = self
            .timed(self.octocrab.body_to_string(response))
            .await?
            .with_context(|| format!("failed to read response of GET {route}"))?;
        serde_json::from_str(&body).with_context(|| format!("failed to decode response of GET {route}"))
    }

    /// Bounds a single request by the configured timeout.
    async fn timed<T>(
        &self,
        request: impl Future<Output = octocrab::Result<T>>,
    ) -> Result<octocrab::Result<T>> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .with_context(|| {
                format!(
                    "GitHub request timed out after {}s",
                    self.request_timeout.as_secs()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_reads_github_error_body() {
        let body = r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest"}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("Not Found"));
    }

    #[test]
    fn test_api_error_message_absent_for_other_bodies() {
        assert_eq!(api_error_message(""), None);
        assert_eq!(api_error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(api_error_message(r#"{"errors":[]}"#), None);
    }
}
