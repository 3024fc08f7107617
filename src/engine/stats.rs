//! Reviewer load statistics

use super::ReviewEngine;
use crate::error::Result;
use crate::models::Stats;

impl ReviewEngine {
    /// Assignment counts per reviewer (any status) and the open pull request count
    pub async fn get_stats(&self) -> Result<Stats> {
        let assignments_by_user = self.stats.count_assignments_by_reviewer().await?;
        let open_pull_requests = self.stats.count_open_pull_requests().await?;

        tracing::debug!(
            reviewers = assignments_by_user.len(),
            open_pull_requests,
            "Stats collected"
        );

        Ok(Stats {
            assignments_by_user,
            open_pull_requests,
        })
    }
}
