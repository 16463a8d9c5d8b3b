use crate::types::{
    CheckConclusion, CheckRunList, Comment, PullRequestDetail, Review, ReviewState,
};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeSet;

/// The only timestamp layout the GitHub REST API emits.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Flattened engagement and CI metrics for one merged pull request.
///
/// Durations are whole seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub pr_number: u64,
    pub created_at: String,
    pub merged_at: Option<String>,
    pub author: String,
    pub number_of_comments: usize,
    pub number_of_review_comments: usize,
    pub number_of_commits: u64,
    pub lines_of_code_changed: u64,
    pub number_of_files_changed: u64,
    pub number_of_reviewers: usize,
    pub number_of_approvals: usize,
    pub labels: Vec<String>,
    /// Seconds from creation to the first issue comment; absent without comments.
    pub time_to_first_response: Option<i64>,
    pub number_of_assignees: usize,
    /// Seconds from creation to the last update of the pull request.
    pub review_duration: i64,
    pub number_of_changes_requested: usize,
    pub number_of_build_runs: usize,
    pub number_of_build_failures: usize,
    pub number_of_linked_issues: usize,
    /// Seconds from the last update to `now`; the only field that varies between runs.
    pub time_since_last_commit: i64,
    pub test_coverage: Option<serde_json::Value>,
    pub number_of_reviews_requested: usize,
    /// Mirrors `number_of_commits`.
    pub number_of_revisions: u64,
    pub number_of_milestones: usize,
    pub dependency_changes: bool,
    /// Distinct authors of issue and review comments, sorted.
    pub comment_authors: Vec<String>,
}

/// Everything fetched for one pull request, ready to be reduced into a record.
#[derive(Debug, Clone)]
pub struct PullRequestActivity {
    pub detail: PullRequestDetail,
    pub issue_comments: Vec<Comment>,
    pub review_comments: Vec<Comment>,
    pub reviews: Vec<Review>,
    pub check_runs: CheckRunList,
}

/// Reduces the fetched payloads of one pull request into a [`MetricsRecord`].
///
/// # Arguments
/// * `activity` - The detail payload plus its comments, reviews and check runs.
/// * `now` - The current time, used for `time_since_last_commit`.
///
/// Fails when a required timestamp is malformed or the pull request has no author.
pub fn build_record(activity: &PullRequestActivity, now: DateTime<Utc>) -> Result<MetricsRecord> {
    let detail = &activity.detail;
    let number = detail.number;

    let created_at = parse_timestamp(&detail.created_at)
        .with_context(|| format!("pull request #{number} has an invalid created_at"))?;
    let updated_at = parse_timestamp(&detail.updated_at)
        .with_context(|| format!("pull request #{number} has an invalid updated_at"))?;
    let author = detail
        .user
        .as_ref()
        .map(|user| user.login.clone())
        .with_context(|| format!("pull request #{number} has no author"))?;

    let time_to_first_response = match activity.issue_comments.first() {
        Some(comment) => {
            let responded_at = parse_timestamp(&comment.created_at).with_context(|| {
                format!("pull request #{number} has a comment with an invalid created_at")
            })?;
            Some((responded_at - created_at).num_seconds())
        }
        None => None,
    };

    let (number_of_build_runs, number_of_build_failures) = count_builds(&activity.check_runs);

    Ok(MetricsRecord {
        pr_number: number,
        created_at: detail.created_at.clone(),
        merged_at: detail.merged_at.clone(),
        author,
        number_of_comments: activity.issue_comments.len(),
        number_of_review_comments: activity.review_comments.len(),
        number_of_commits: detail.commits,
        lines_of_code_changed: detail.additions + detail.deletions,
        number_of_files_changed: detail.changed_files,
        number_of_reviewers: count_reviewers(&activity.reviews),
        number_of_approvals: count_reviews_in_state(&activity.reviews, ReviewState::Approved),
        labels: detail.labels.iter().map(|label| label.name.clone()).collect(),
        time_to_first_response,
        number_of_assignees: detail.assignees.len(),
        review_duration: (updated_at - created_at).num_seconds(),
        number_of_changes_requested: count_reviews_in_state(
            &activity.reviews,
            ReviewState::ChangesRequested,
        ),
        number_of_build_runs,
        number_of_build_failures,
        number_of_linked_issues: detail.linked_issues.as_ref().map_or(0, Vec::len),
        time_since_last_commit: (now - updated_at).num_seconds(),
        test_coverage: detail.test_coverage.clone(),
        number_of_reviews_requested: detail.requested_reviewers.len(),
        number_of_revisions: detail.commits,
        number_of_milestones: usize::from(detail.milestone.is_some()),
        dependency_changes: has_dependency_label(detail),
        comment_authors: comment_authors(&activity.issue_comments, &activity.review_comments),
    })
}

/// Parses a GitHub timestamp such as `2024-01-05T10:00:00Z`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let parsed = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("malformed timestamp '{value}'"))?;
    Ok(parsed.and_utc())
}

fn count_builds(check_runs: &CheckRunList) -> (usize, usize) {
    let failures = check_runs
        .check_runs
        .iter()
        .filter(|run| run.conclusion == Some(CheckConclusion::Failure))
        .count();
    (check_runs.check_runs.len(), failures)
}

fn count_reviewers(reviews: &[Review]) -> usize {
    reviews
        .iter()
        .filter_map(|review| review.user.as_ref())
        .map(|user| user.login.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

fn count_reviews_in_state(reviews: &[Review], state: ReviewState) -> usize {
    reviews.iter().filter(|review| review.state == state).count()
}

fn comment_authors(issue_comments: &[Comment], review_comments: &[Comment]) -> Vec<String> {
    issue_comments
        .iter()
        .chain(review_comments)
        .filter_map(|comment| comment.user.as_ref())
        .map(|user| user.login.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Stem shared by "dependency" and "dependencies".
const DEPENDENCY_LABEL_STEM: &str = "dependenc";

fn has_dependency_label(detail: &PullRequestDetail) -> bool {
    detail
        .labels
        .iter()
        .any(|label| label.name.to_lowercase().contains(DEPENDENCY_LABEL_STEM))
}
