//! Guards every GitHub request against an exhausted rate limit.
//!
//! The guard keeps no local counter: each check re-queries the live quota, so it can be
//! shared by any number of concurrent workers without synchronization.

use anyhow::Context;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Extra time slept past the reported reset instant.
pub const RESET_BUFFER_SECONDS: i64 = 10;

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: Quota,
}

/// The core REST quota as reported by `/rate_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Quota {
    pub remaining: u64,
    /// Unix epoch seconds at which the quota resets.
    pub reset: i64,
}

#[derive(Clone)]
pub struct RateLimitGuard {
    octocrab: Octocrab,
    request_timeout: StdDuration,
}

impl RateLimitGuard {
    pub fn new(octocrab: Octocrab, request_timeout: StdDuration) -> Self {
        Self {
            octocrab,
            request_timeout,
        }
    }

    /// Queries the remaining quota. Any failure here is fatal for the caller.
    pub async fn check_quota(&self) -> anyhow::Result<Quota> {
        let response: RateLimitResponse = tokio::time::timeout(
            self.request_timeout,
            self.octocrab
                .get::<RateLimitResponse, _, _>("/rate_limit", None::<&()>),
        )
        .await
        .context("rate limit check timed out")?
        .context("failed to query rate limit")?;

        Ok(response.rate)
    }

    /// Suspends the calling task until the quota resets, if it is exhausted.
    pub async fn await_quota(&self) -> anyhow::Result<()> {
        let quota = self.check_quota().await?;
        if let Some(wait) = wait_duration(quota, Utc::now()) {
            tracing::warn!(
                seconds = wait.as_secs(),
                "Rate limit reached. Sleeping until reset."
            );
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}

/// Computes how long to wait before issuing the next request.
///
/// Returns `None` while quota remains. Once exhausted, the wait runs until the reset
/// instant plus [`RESET_BUFFER_SECONDS`], and never below zero.
pub fn wait_duration(quota: Quota, now: DateTime<Utc>) -> Option<StdDuration> {
    if quota.remaining > 0 {
        return None;
    }

    let seconds = (quota.reset - now.timestamp() + RESET_BUFFER_SECONDS).max(0);
    Some(StdDuration::from_secs(seconds.unsigned_abs()))
}
