//! Reviewer reassignment
//!
//! Replacement candidates come from the departing reviewer's own team, which
//! is not necessarily the author's team.

use serde::{Deserialize, Serialize};

use super::{require, ReviewEngine};
use crate::error::{Error, Result};
use crate::models::{needs_more_reviewers, PullRequest};

/// Outcome of a successful reassignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignResult {
    /// Pull request state after the swap
    pub pull_request: PullRequest,
    /// Id of the reviewer that took the slot
    pub replaced_by: String,
}

impl ReviewEngine {
    /// Replace `old_reviewer_id` on a pull request with a random eligible
    /// member of the old reviewer's team
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignResult> {
        require(pr_id, "pull_request_id")?;
        require(old_reviewer_id, "old_reviewer_id")?;

        tracing::debug!(pr_id, old_reviewer_id, "Reassigning reviewer");

        let pull_request = self.pull_requests.get(pr_id).await?;
        if pull_request.is_merged() {
            return Err(Error::PullRequestMerged);
        }
        if !pull_request.has_reviewer(old_reviewer_id) {
            return Err(Error::ReviewerNotAssigned);
        }

        let old_reviewer = self.directory.get_user(old_reviewer_id).await?;
        let candidates: Vec<String> = self
            .directory
            .list_active_members(&old_reviewer.team_name)
            .await?
            .into_iter()
            .map(|user| user.id)
            .filter(|id| {
                id != old_reviewer_id
                    && id != &pull_request.author_id
                    && !pull_request.has_reviewer(id)
            })
            .collect();

        let replaced_by = self.random.pick_one(&candidates).ok_or(Error::NoCandidate)?;

        self.pull_requests
            .replace_reviewer(pr_id, old_reviewer_id, Some(replaced_by.as_str()))
            .await?;

        let pull_request = self.refresh_need_more_reviewers(pr_id).await?;

        tracing::info!(
            pr_id,
            old_reviewer_id,
            new_reviewer_id = %replaced_by,
            "Reviewer reassigned"
        );

        Ok(ReassignResult {
            pull_request,
            replaced_by,
        })
    }

    /// Recompute `need_more_reviewers` from the stored reviewer set and
    /// return the fresh pull request
    pub(crate) async fn refresh_need_more_reviewers(&self, pr_id: &str) -> Result<PullRequest> {
        let current = self.pull_requests.get(pr_id).await?;
        let need_more = needs_more_reviewers(current.assigned_reviewers.len());
        self.pull_requests
            .update_need_more_reviewers(pr_id, need_more)
            .await?;
        Ok(PullRequest {
            need_more_reviewers: need_more,
            ..current
        })
    }
}
