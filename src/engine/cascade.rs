//! Team-wide deactivation cascade
//!
//! Deactivating users leaves holes in every open pull request they were
//! reviewing. Each `(reviewer, pull request)` pair is repaired on its own:
//! the slot goes to a random active teammate when one is eligible, otherwise
//! the reviewer is dropped and the pull request is flagged as needing more
//! reviewers.
//!
//! The cascade is not atomic across pull requests. If a repair fails,
//! pull requests already repaired stay repaired and the error is returned.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{require, ReviewEngine};
use crate::error::{Error, Result};
use crate::models::{PullRequest, User};

/// Outcome of a team deactivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateResult {
    /// Users whose active flag was cleared
    pub users: Vec<User>,
    /// Final state of every pull request touched, each listed once
    pub affected_pull_requests: Vec<PullRequest>,
}

impl ReviewEngine {
    /// Deactivate the named members of a team, or all of them when
    /// `user_ids` is empty, then repair their open reviews
    pub async fn deactivate_team_users(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<DeactivateResult> {
        require(team_name, "team_name")?;

        tracing::debug!(team = team_name, requested = user_ids.len(), "Deactivating team users");

        let users = self
            .directory
            .bulk_set_active(team_name, user_ids, false)
            .await?;
        let deactivated: Vec<String> = users.iter().map(|user| user.id.clone()).collect();

        let open_by_reviewer = self
            .pull_requests
            .list_open_by_reviewers(&deactivated)
            .await?;

        let active: Vec<String> = self
            .directory
            .list_active_members(team_name)
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect();

        let mut affected: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // Walk reviewers in deactivation order so repairs are reproducible
        // under a seeded randomness source.
        for reviewer_id in &deactivated {
            let Some(pull_requests) = open_by_reviewer.get(reviewer_id) else {
                continue;
            };
            for pull_request in pull_requests {
                self.repair(pull_request, reviewer_id, &active).await?;
                if seen.insert(pull_request.id.clone()) {
                    affected.push(pull_request.id.clone());
                }
            }
        }

        let mut affected_pull_requests = Vec::with_capacity(affected.len());
        for pr_id in &affected {
            affected_pull_requests.push(self.pull_requests.get(pr_id).await?);
        }

        tracing::info!(
            team = team_name,
            deactivated = users.len(),
            affected = affected_pull_requests.len(),
            "Team users deactivated"
        );

        Ok(DeactivateResult {
            users,
            affected_pull_requests,
        })
    }

    /// Replace or drop one deactivated reviewer on one pull request
    async fn repair(
        &self,
        pull_request: &PullRequest,
        reviewer_id: &str,
        active: &[String],
    ) -> Result<()> {
        let pr_id = pull_request.id.as_str();

        // Re-read: an earlier pair in this cascade may have touched the same PR.
        let current = self.pull_requests.list_assigned_reviewers(pr_id).await?;

        let candidates: Vec<String> = active
            .iter()
            .filter(|id| **id != pull_request.author_id && !current.contains(id))
            .cloned()
            .collect();

        match self.random.pick_one(&candidates) {
            Some(replacement) => {
                self.pull_requests
                    .replace_reviewer(pr_id, reviewer_id, Some(replacement.as_str()))
                    .await?;
                tracing::debug!(pr_id, reviewer_id, replacement = %replacement, "Reviewer replaced");
            }
            None => {
                match self
                    .pull_requests
                    .replace_reviewer(pr_id, reviewer_id, None)
                    .await
                {
                    Ok(()) | Err(Error::ReviewerNotAssigned) => {}
                    Err(err) => return Err(err),
                }
                tracing::warn!(pr_id, reviewer_id, "No active candidate, reviewer dropped");
            }
        }

        self.refresh_need_more_reviewers(pr_id).await?;
        Ok(())
    }
}
