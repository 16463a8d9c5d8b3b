pub mod collector;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod rate_limit;
pub mod types;

use collector::MetricsCollector;
use config::AppConfig;
use metrics::MetricsRecord;
use std::path::PathBuf;

/// Result of a complete export run.
#[derive(Debug)]
pub enum ExportOutcome {
    /// The repository has no merged pull requests; nothing was written.
    NoPullRequests,
    /// Records were written to `path`, sorted by pull request number.
    Exported {
        records: Vec<MetricsRecord>,
        path: PathBuf,
    },
}

/// Collects metrics for every merged pull request of the configured repository and
/// writes them to the configured CSV file.
///
/// Quota-check and list failures abort the run. Failures of individual pull requests
/// are logged and those records left out.
pub async fn export_repository_metrics(config: &AppConfig) -> anyhow::Result<ExportOutcome> {
    let collector = MetricsCollector::new(config)?;

    let prs = collector.fetch_pull_requests().await?;
    if prs.is_empty() {
        return Ok(ExportOutcome::NoPullRequests);
    }

    let mut records = collector.collect(&prs).await;
    export::sort_records(&mut records);
    export::write_csv(&records, &config.output_path)?;

    tracing::info!(
        records = records.len(),
        failed = prs.len() - records.len(),
        path = %config.output_path.display(),
        "Exported pull request metrics"
    );

    Ok(ExportOutcome::Exported {
        records,
        path: config.output_path.clone(),
    })
}
