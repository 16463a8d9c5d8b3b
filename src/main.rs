use pr_metrics::config::AppConfig;
use pr_metrics::{export, export_repository_metrics, ExportOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PREVIEW_ROWS: usize = 5;

#[tokio::main]
async fn main() {
    // Values already present in the environment win over the .env file.
    dotenvy::dotenv().ok();

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}. Exiting.", e);
            std::process::exit(1);
        }
    };

    tracing::info!(repo = %config.github_repo, workers = config.worker_count, "Starting export");

    match export_repository_metrics(&config).await {
        Ok(ExportOutcome::NoPullRequests) => {
            println!("No pull requests found.");
        }
        Ok(ExportOutcome::Exported { records, path }) => {
            print!("{}", export::preview(&records, PREVIEW_ROWS));
            println!("Data has been saved to {}", path.display());
        }
        Err(e) => {
            tracing::error!("Export failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
