use crate::config::RepoId;
use crate::github::GitHubClient;
use crate::metrics::{self, MetricsRecord, PullRequestActivity};
use crate::types::CheckRunList;
use anyhow::Result;
use chrono::Utc;

/// Fetches everything known about one pull request and reduces it into a record.
///
/// This function separates the logic of data retrieval from the derivation rules in
/// [`metrics::build_record`]. The detail fetch is fatal; comments, reviews and check
/// runs degrade to empty collections.
pub async fn extract_metrics(
    client: &GitHubClient,
    repo: &RepoId,
    pr_number: u64,
) -> Result<MetricsRecord> {
    let detail = client.fetch_pull_request(repo, pr_number).await?;
    let issue_comments = client.fetch_issue_comments(repo, pr_number).await?;
    let review_comments = client.fetch_review_comments(repo, pr_number).await?;
    let reviews = client.fetch_reviews(repo, pr_number).await?;

    let check_runs = match detail.merge_commit_sha.as_deref() {
        Some(sha) => client.fetch_check_runs(repo, sha).await?,
        None => CheckRunList::default(),
    };

    tracing::debug!(pr = pr_number, "Fetched pull request activity");

    let activity = PullRequestActivity {
        detail,
        issue_comments,
        review_comments,
        reviews,
        check_runs,
    };

    metrics::build_record(&activity, Utc::now())
}
