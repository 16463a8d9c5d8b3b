//! CSV export of collected metrics records.

use crate::metrics::MetricsRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Column names in file order.
pub const COLUMNS: [&str; 26] = [
    "pr_number",
    "created_at",
    "merged_at",
    "author",
    "number_of_comments",
    "number_of_review_comments",
    "number_of_commits",
    "lines_of_code_changed",
    "number_of_files_changed",
    "number_of_reviewers",
    "number_of_approvals",
    "labels",
    "time_to_first_response",
    "number_of_assignees",
    "review_duration",
    "number_of_changes_requested",
    "number_of_build_runs",
    "number_of_build_failures",
    "number_of_linked_issues",
    "time_since_last_commit",
    "test_coverage",
    "number_of_reviews_requested",
    "number_of_revisions",
    "number_of_milestones",
    "dependency_changes",
    "comment_authors",
];

/// One CSV line. List-valued fields are rendered as JSON arrays and absent values as
/// empty cells.
#[derive(Serialize)]
struct CsvRow<'a> {
    pr_number: u64,
    created_at: &'a str,
    merged_at: Option<&'a str>,
    author: &'a str,
    number_of_comments: usize,
    number_of_review_comments: usize,
    number_of_commits: u64,
    lines_of_code_changed: u64,
    number_of_files_changed: u64,
    number_of_reviewers: usize,
    number_of_approvals: usize,
    labels: String,
    time_to_first_response: Option<i64>,
    number_of_assignees: usize,
    review_duration: i64,
    number_of_changes_requested: usize,
    number_of_build_runs: usize,
    number_of_build_failures: usize,
    number_of_linked_issues: usize,
    time_since_last_commit: i64,
    test_coverage: Option<String>,
    number_of_reviews_requested: usize,
    number_of_revisions: u64,
    number_of_milestones: usize,
    dependency_changes: bool,
    comment_authors: String,
}

impl<'a> CsvRow<'a> {
    fn from_record(record: &'a MetricsRecord) -> Result<Self> {
        Ok(Self {
            pr_number: record.pr_number,
            created_at: &record.created_at,
            merged_at: record.merged_at.as_deref(),
            author: &record.author,
            number_of_comments: record.number_of_comments,
            number_of_review_comments: record.number_of_review_comments,
            number_of_commits: record.number_of_commits,
            lines_of_code_changed: record.lines_of_code_changed,
            number_of_files_changed: record.number_of_files_changed,
            number_of_reviewers: record.number_of_reviewers,
            number_of_approvals: record.number_of_approvals,
            labels: serde_json::to_string(&record.labels)?,
            time_to_first_response: record.time_to_first_response,
            number_of_assignees: record.number_of_assignees,
            review_duration: record.review_duration,
            number_of_changes_requested: record.number_of_changes_requested,
            number_of_build_runs: record.number_of_build_runs,
            number_of_build_failures: record.number_of_build_failures,
            number_of_linked_issues: record.number_of_linked_issues,
            time_since_last_commit: record.time_since_last_commit,
            test_coverage: record.test_coverage.as_ref().map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            number_of_reviews_requested: record.number_of_reviews_requested,
            number_of_revisions: record.number_of_revisions,
            number_of_milestones: record.number_of_milestones,
            dependency_changes: record.dependency_changes,
            comment_authors: serde_json::to_string(&record.comment_authors)?,
        })
    }
}

/// Sorts records by pull request number so repeated runs produce the same file.
pub fn sort_records(records: &mut [MetricsRecord]) {
    records.sort_by_key(|record| record.pr_number);
}

/// Writes `records` to `path` as CSV with a header row, replacing any existing file.
pub fn write_csv(records: &[MetricsRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    if records.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for record in records {
        writer
            .serialize(CsvRow::from_record(record)?)
            .with_context(|| format!("failed to write PR #{}", record.pr_number))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Renders a short human-readable summary of the first `limit` records.
pub fn preview(records: &[MetricsRecord], limit: usize) -> String {
    let mut out = format!(
        "{:>8}  {:<20} {:>8} {:>8} {:>9} {:>7} {:>8}\n",
        "pr", "author", "comments", "reviews", "approvals", "builds", "failures"
    );
    for record in records.iter().take(limit) {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{:>8}  {:<20} {:>8} {:>8} {:>9} {:>7} {:>8}",
            record.pr_number,
            record.author,
            record.number_of_comments,
            record.number_of_review_comments,
            record.number_of_approvals,
            record.number_of_build_runs,
            record.number_of_build_failures,
        );
    }
    if records.len() > limit {
        let _ = writeln!(out, "... {} more", records.len() - limit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pr_number: u64) -> MetricsRecord {
        MetricsRecord {
            pr_number,
            created_at: "2024-01-05T10:00:00Z".to_string(),
            merged_at: Some("2024-01-06T09:00:00Z".to_string()),
            author: "alice".to_string(),
            number_of_comments: 0,
            number_of_review_comments: 2,
            number_of_commits: 3,
            lines_of_code_changed: 150,
            number_of_files_changed: 4,
            number_of_reviewers: 1,
            number_of_approvals: 1,
            labels: vec!["dependencies".to_string(), "bug".to_string()],
            time_to_first_response: None,
            number_of_assignees: 0,
            review_duration: 86_400,
            number_of_changes_requested: 0,
            number_of_build_runs: 2,
            number_of_build_failures: 1,
            number_of_linked_issues: 0,
            time_since_last_commit: 345_600,
            test_coverage: None,
            number_of_reviews_requested: 1,
            number_of_revisions: 3,
            number_of_milestones: 0,
            dependency_changes: true,
            comment_authors: vec!["bob".to_string(), "carol".to_string()],
        }
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut second = record(9);
        second.time_to_first_response = Some(1800);
        second.test_coverage = Some(json!(87.5));
        write_csv(&[record(7), second], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);

        let column = |name: &str| COLUMNS.iter().position(|c| *c == name).unwrap();
        assert_eq!(&rows[0][column("pr_number")], "7");
        assert_eq!(&rows[0][column("time_to_first_response")], "");
        assert_eq!(&rows[0][column("test_coverage")], "");
        assert_eq!(&rows[0][column("labels")], r#"["dependencies","bug"]"#);
        assert_eq!(&rows[0][column("comment_authors")], r#"["bob","carol"]"#);
        assert_eq!(&rows[0][column("dependency_changes")], "true");
        assert_eq!(&rows[1][column("time_to_first_response")], "1800");
        assert_eq!(&rows[1][column("test_coverage")], "87.5");
    }

    #[test]
    fn test_write_csv_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        write_csv(&[record(1), record(2), record(3)], &path).unwrap();
        write_csv(&[record(4)], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn test_write_csv_without_records_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        write_csv(&[], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_sort_records_by_pr_number() {
        let mut records = vec![record(42), record(3), record(17)];
        sort_records(&mut records);
        let numbers: Vec<u64> = records.iter().map(|r| r.pr_number).collect();
        assert_eq!(numbers, vec![3, 17, 42]);
    }

    #[test]
    fn test_preview_limits_rows() {
        let records: Vec<MetricsRecord> = (1..=7).map(record).collect();
        let text = preview(&records, 5);

        assert_eq!(text.lines().count(), 7);
        assert!(text.contains("alice"));
        assert!(text.ends_with("... 2 more\n"));
    }
}
