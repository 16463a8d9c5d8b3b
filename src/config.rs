//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the target repository, the credential
//! used against the GitHub API, and the limits applied to pagination and the worker pool.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoId {
    /// The owner of the repository (e.g., "freeCodeCamp").
    pub owner: String,
    /// The name of the repository (e.g., "freeCodeCamp").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').map(str::trim).collect();
        match parts.as_slice() {
            [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok(RepoId {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => bail!("invalid repository '{s}', expected 'owner/name'"),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Credential sent with every GitHub API request.
    pub github_token: String,

    /// Repository whose merged pull requests are exported.
    /// Expected format: "owner/name".
    #[serde(deserialize_with = "deserialize_repo")]
    pub github_repo: RepoId,

    /// Upper bound on the number of pull requests gathered from the paginated list.
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Number of pull requests processed concurrently.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Destination of the CSV export.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Per-request timeout for calls against the GitHub API.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Optional override of the REST API base, mostly for GitHub Enterprise and tests.
    pub github_api_url: Option<String>,
}

fn default_max_requests() -> usize {
    20_000
}

fn default_worker_count() -> usize {
    50
}

fn default_output_path() -> PathBuf {
    PathBuf::from("pull_request_metrics.csv")
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the credential and repository.
    pub fn new(github_token: impl Into<String>, github_repo: RepoId) -> Self {
        Self {
            github_token: github_token.into(),
            github_repo,
            max_requests: default_max_requests(),
            worker_count: default_worker_count(),
            output_path: default_output_path(),
            request_timeout_seconds: default_request_timeout_seconds(),
            github_api_url: None,
        }
    }

    /// Loads and validates the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = envy::from_env().context("failed to read configuration from environment")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would fail later, before any network call is made.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.github_token.trim().is_empty() {
            bail!("GitHub token not found. Set the GITHUB_TOKEN environment variable.");
        }
        if self.max_requests == 0 {
            bail!("MAX_REQUESTS must be greater than zero");
        }
        if self.worker_count == 0 {
            bail!("WORKER_COUNT must be greater than zero");
        }
        if self.request_timeout_seconds == 0 {
            bail!("REQUEST_TIMEOUT_SECONDS must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_seconds)
    }
}

fn deserialize_repo<'de, D>(deserializer: D) -> Result<RepoId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 7] = [
        "GITHUB_TOKEN",
        "GITHUB_REPO",
        "MAX_REQUESTS",
        "WORKER_COUNT",
        "OUTPUT_PATH",
        "REQUEST_TIMEOUT_SECONDS",
        "GITHUB_API_URL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("GITHUB_REPO", "owner1/repo1");
        env::set_var("MAX_REQUESTS", "500");
        env::set_var("WORKER_COUNT", "8");
        env::set_var("OUTPUT_PATH", "out/metrics.csv");
        env::set_var("REQUEST_TIMEOUT_SECONDS", "5");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.github_token, "secret");
        assert_eq!(config.github_repo.owner, "owner1");
        assert_eq!(config.github_repo.repo, "repo1");
        assert_eq!(config.max_requests, 500);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.output_path, PathBuf::from("out/metrics.csv"));
        assert_eq!(config.request_timeout(), StdDuration::from_secs(5));
        assert!(config.github_api_url.is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("GITHUB_REPO", "freeCodeCamp/freeCodeCamp");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.max_requests, 20_000);
        assert_eq!(config.worker_count, 50);
        assert_eq!(config.output_path, PathBuf::from("pull_request_metrics.csv"));
        assert_eq!(config.request_timeout_seconds, 30);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_missing_token() {
        clear_env();
        env::set_var("GITHUB_REPO", "owner/repo");
        assert!(AppConfig::from_env().is_err());

        env::set_var("GITHUB_TOKEN", "   ");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_workers() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("GITHUB_REPO", "owner/repo");
        env::set_var("WORKER_COUNT", "0");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_parse_repo_id() {
        let repo: RepoId = " rust-lang / rust ".parse().unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.repo, "rust");
        assert_eq!(repo.to_string(), "rust-lang/rust");

        assert!("rust-lang".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
        assert!("/rust".parse::<RepoId>().is_err());
    }
}
