//! Initial reviewer assignment and the rest of the pull request lifecycle

use super::{require, ReviewEngine};
use crate::error::{Error, Result};
use crate::models::{PullRequest, PullRequestShort, REQUIRED_REVIEWERS};

impl ReviewEngine {
    /// Create a pull request and assign up to two reviewers from the
    /// author's team
    ///
    /// Candidates are the author's active teammates. With fewer than two
    /// candidates every one of them is assigned and the pull request is
    /// flagged as needing more reviewers.
    pub async fn create_pull_request(
        &self,
        pr_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest> {
        require(pr_id, "pull_request_id")?;
        require(name, "pull_request_name")?;
        require(author_id, "author_id")?;

        tracing::debug!(pr_id, author_id, "Creating pull request");

        let author = match self.directory.get_user(author_id).await {
            Ok(user) => user,
            Err(Error::UserNotFound) => return Err(Error::AuthorNotFound),
            Err(err) => return Err(err),
        };

        let candidates: Vec<String> = self
            .directory
            .list_active_members(&author.team_name)
            .await?
            .into_iter()
            .filter(|user| user.id != author.id)
            .map(|user| user.id)
            .collect();

        let reviewers = self.random.pick(&candidates, REQUIRED_REVIEWERS);
        let draft = PullRequest::open(pr_id, name, author_id, reviewers);

        let created = self.pull_requests.create(&draft).await?;

        tracing::info!(
            pr_id,
            author_id,
            team = %author.team_name,
            reviewers = ?created.assigned_reviewers,
            need_more_reviewers = created.need_more_reviewers,
            "Pull request created"
        );

        Ok(created)
    }

    /// Mark a pull request merged
    ///
    /// Merging twice is not an error; the second call returns the pull
    /// request unchanged with its original merge time.
    pub async fn merge_pull_request(&self, pr_id: &str) -> Result<PullRequest> {
        require(pr_id, "pull_request_id")?;

        let merged = self.pull_requests.set_merged(pr_id).await?;
        tracing::info!(pr_id, merged_at = ?merged.merged_at, "Pull request merged");
        Ok(merged)
    }

    /// Look up a pull request
    pub async fn get_pull_request(&self, pr_id: &str) -> Result<PullRequest> {
        require(pr_id, "pull_request_id")?;
        self.pull_requests.get(pr_id).await
    }

    /// Every pull request the user is assigned to review, newest first
    pub async fn get_user_reviews(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        require(user_id, "user_id")?;

        self.directory.get_user(user_id).await?;
        self.pull_requests.list_review_pull_requests(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::models::{PullRequestStatus, TeamMember};
    use crate::random::SafeRandom;
    use crate::storage::{create_memory_store, DirectoryRepository};
    use crate::ReviewEngine;

    async fn engine_with(members: &[(&str, bool)]) -> ReviewEngine {
        let store = create_memory_store();
        let members: Vec<TeamMember> = members
            .iter()
            .map(|(id, active)| TeamMember::new(*id, id.to_uppercase()).with_active(*active))
            .collect();
        store.create_team("backend", &members).await.unwrap();
        ReviewEngine::from_store(store, SafeRandom::with_seed(11))
    }

    #[tokio::test]
    async fn test_two_reviewers_never_author() {
        let engine = engine_with(&[("u1", true), ("u2", true), ("u3", true), ("u4", true)]).await;

        let pr = engine.create_pull_request("pr-1", "Add search", "u1").await.unwrap();

        assert_eq!(pr.assigned_reviewers.len(), 2);
        assert!(!pr.has_reviewer("u1"));
        assert_ne!(pr.assigned_reviewers[0], pr.assigned_reviewers[1]);
        assert!(!pr.need_more_reviewers);
        assert_eq!(pr.status, PullRequestStatus::Open);
    }

    #[tokio::test]
    async fn test_inactive_members_not_candidates() {
        let engine = engine_with(&[("u1", true), ("u2", false), ("u3", true)]).await;

        let pr = engine.create_pull_request("pr-1", "Fix", "u1").await.unwrap();

        assert_eq!(pr.assigned_reviewers, vec!["u3".to_string()]);
        assert!(pr.need_more_reviewers);
    }

    #[tokio::test]
    async fn test_unknown_author() {
        let engine = engine_with(&[("u1", true)]).await;

        let err = engine.create_pull_request("pr-1", "Fix", "ghost").await.unwrap_err();
        assert!(matches!(err, Error::AuthorNotFound));
    }

    #[tokio::test]
    async fn test_empty_arguments() {
        let engine = engine_with(&[("u1", true)]).await;

        for (id, name, author) in [("", "n", "u1"), ("pr", "", "u1"), ("pr", "n", "")] {
            let err = engine.create_pull_request(id, name, author).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        assert!(matches!(
            engine.merge_pull_request("").await.unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            engine.get_user_reviews("").await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let engine = engine_with(&[("u1", true), ("u2", true)]).await;

        engine.create_pull_request("pr-1", "One", "u1").await.unwrap();
        let err = engine.create_pull_request("pr-1", "Two", "u2").await.unwrap_err();
        assert!(matches!(err, Error::PullRequestExists));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let engine = engine_with(&[("u1", true), ("u2", true)]).await;
        engine.create_pull_request("pr-1", "One", "u1").await.unwrap();

        let first = engine.merge_pull_request("pr-1").await.unwrap();
        let second = engine.merge_pull_request("pr-1").await.unwrap();

        assert!(first.is_merged());
        assert!(first.merged_at.is_some());
        assert_eq!(first.merged_at, second.merged_at);
        assert!(matches!(
            engine.merge_pull_request("missing").await.unwrap_err(),
            Error::PullRequestNotFound
        ));
    }

    #[tokio::test]
    async fn test_user_reviews() {
        let engine = engine_with(&[("u1", true), ("u2", true)]).await;
        engine.create_pull_request("pr-1", "One", "u1").await.unwrap();
        engine.create_pull_request("pr-2", "Two", "u1").await.unwrap();
        engine.merge_pull_request("pr-1").await.unwrap();

        let reviews = engine.get_user_reviews("u2").await.unwrap();
        let ids: Vec<_> = reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["pr-2", "pr-1"]);
        assert_eq!(reviews[1].status, PullRequestStatus::Merged);

        assert!(engine.get_user_reviews("u1").await.unwrap().is_empty());
        assert!(matches!(
            engine.get_user_reviews("ghost").await.unwrap_err(),
            Error::UserNotFound
        ));
    }
}
