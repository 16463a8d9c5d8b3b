//! Raw GitHub REST payloads, reduced to the fields the metrics are derived from.
//!
//! Timestamps are kept as the strings the API returns; they are parsed when a
//! record is built so that a malformed value fails that record alone.

use serde::Deserialize;

/// An entry of the pull request list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    #[serde(default)]
    pub merged_at: Option<String>,
}

impl PullRequestSummary {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// The single pull request endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub user: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    #[serde(default)]
    pub assignees: Vec<User>,
    #[serde(default)]
    pub requested_reviewers: Vec<User>,
    #[serde(default)]
    pub milestone: Option<serde_json::Value>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    /// Not part of the standard payload; usually absent.
    #[serde(default)]
    pub linked_issues: Option<Vec<serde_json::Value>>,
    /// Not part of the standard payload; usually absent.
    #[serde(default)]
    pub test_coverage: Option<serde_json::Value>,
}

/// An issue-level or review-level comment.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub user: Option<User>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: Option<User>,
    pub state: ReviewState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    /// `None` while the run is still in progress.
    pub conclusion: Option<CheckConclusion>,
}

/// The check-runs endpoint for one commit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRunList {
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}
