//! In-process implementation of every repository port
//!
//! Mirrors the observable behaviour of the PostgreSQL adapter, including the
//! team-existence check on empty member lists and the all-or-nothing bulk
//! activation. Useful for tests and for embedding the engine without a
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{DirectoryRepository, PullRequestRepository, StatsRepository};
use crate::error::{Error, Result};
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus, Team, TeamMember, User};

#[derive(Debug, Clone)]
struct UserRecord {
    username: String,
    team_name: String,
    is_active: bool,
}

#[derive(Debug, Clone)]
struct PullRequestRecord {
    pull_request: PullRequest,
    /// Insertion sequence, used as a stable "newest first" tiebreak
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Team name -> member ids
    teams: HashMap<String, Vec<String>>,
    users: HashMap<String, UserRecord>,
    pull_requests: HashMap<String, PullRequestRecord>,
    next_seq: u64,
}

impl MemoryState {
    fn user(&self, user_id: &str) -> Result<User> {
        self.users
            .get(user_id)
            .map(|record| to_user(user_id, record))
            .ok_or(Error::UserNotFound)
    }

    fn team(&self, name: &str) -> Result<Team> {
        let member_ids = self.teams.get(name).ok_or(Error::TeamNotFound)?;
        let mut members: Vec<TeamMember> = member_ids
            .iter()
            .filter_map(|id| {
                self.users.get(id).map(|record| TeamMember {
                    user_id: id.clone(),
                    username: record.username.clone(),
                    is_active: record.is_active,
                })
            })
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Team::new(name, members))
    }

    fn pull_request_mut(&mut self, pr_id: &str) -> Result<&mut PullRequest> {
        self.pull_requests
            .get_mut(pr_id)
            .map(|record| &mut record.pull_request)
            .ok_or(Error::PullRequestNotFound)
    }
}

fn to_user(user_id: &str, record: &UserRecord) -> User {
    User {
        id: user_id.to_string(),
        username: record.username.clone(),
        team_name: record.team_name.clone(),
        is_active: record.is_active,
    }
}

/// In-memory store backed by a single async `RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pull requests
    pub async fn pull_request_count(&self) -> usize {
        self.state.read().await.pull_requests.len()
    }

    /// Number of known users across all teams
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<Team> {
        let mut state = self.state.write().await;
        if state.teams.contains_key(name) {
            return Err(Error::TeamExists);
        }

        let mut member_ids: Vec<String> = Vec::with_capacity(members.len());
        for member in members {
            // Upsert moves a user out of any previous team.
            let previous_team = state
                .users
                .get(&member.user_id)
                .map(|previous| previous.team_name.clone());
            if let Some(previous_team) = previous_team {
                if let Some(ids) = state.teams.get_mut(&previous_team) {
                    ids.retain(|id| id != &member.user_id);
                }
            }
            state.users.insert(
                member.user_id.clone(),
                UserRecord {
                    username: member.username.clone(),
                    team_name: name.to_string(),
                    is_active: member.is_active,
                },
            );
            if !member_ids.contains(&member.user_id) {
                member_ids.push(member.user_id.clone());
            }
        }
        state.teams.insert(name.to_string(), member_ids);

        tracing::debug!(team = %name, members = members.len(), "team stored");
        state.team(name)
    }

    async fn get_team(&self, name: &str) -> Result<Team> {
        self.state.read().await.team(name)
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        self.state.read().await.user(user_id)
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let mut state = self.state.write().await;
        let record = state.users.get_mut(user_id).ok_or(Error::UserNotFound)?;
        record.is_active = is_active;
        state.user(user_id)
    }

    async fn list_active_members(&self, team_name: &str) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let member_ids = state.teams.get(team_name).ok_or(Error::TeamNotFound)?;
        Ok(member_ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|record| to_user(id, record)))
            .filter(|user| user.is_active)
            .collect())
    }

    async fn bulk_set_active(
        &self,
        team_name: &str,
        user_ids: &[String],
        is_active: bool,
    ) -> Result<Vec<User>> {
        let mut state = self.state.write().await;
        let member_ids = state
            .teams
            .get(team_name)
            .cloned()
            .ok_or(Error::TeamNotFound)?;

        let targets: Vec<String> = if user_ids.is_empty() {
            member_ids
        } else {
            if user_ids.iter().any(|id| !member_ids.contains(id)) {
                return Err(Error::UserNotFound);
            }
            let mut unique = Vec::with_capacity(user_ids.len());
            for id in user_ids {
                if !unique.contains(id) {
                    unique.push(id.clone());
                }
            }
            unique
        };

        let mut updated = Vec::with_capacity(targets.len());
        for id in &targets {
            if let Some(record) = state.users.get_mut(id) {
                record.is_active = is_active;
                updated.push(to_user(id, record));
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl PullRequestRepository for MemoryStore {
    async fn create(&self, pull_request: &PullRequest) -> Result<PullRequest> {
        let mut state = self.state.write().await;
        if state.pull_requests.contains_key(&pull_request.id) {
            return Err(Error::PullRequestExists);
        }
        if !state.users.contains_key(&pull_request.author_id) {
            return Err(Error::AuthorNotFound);
        }
        if let Some(unknown) = pull_request
            .assigned_reviewers
            .iter()
            .find(|id| !state.users.contains_key(*id))
        {
            return Err(Error::storage(format!(
                "reviewer {unknown} references an unknown user"
            )));
        }

        let mut stored = pull_request.clone();
        stored.status = PullRequestStatus::Open;
        stored.created_at = Utc::now();
        stored.merged_at = None;

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pull_requests.insert(
            stored.id.clone(),
            PullRequestRecord {
                pull_request: stored.clone(),
                seq,
            },
        );
        Ok(stored)
    }

    async fn get(&self, pr_id: &str) -> Result<PullRequest> {
        self.state
            .read()
            .await
            .pull_requests
            .get(pr_id)
            .map(|record| record.pull_request.clone())
            .ok_or(Error::PullRequestNotFound)
    }

    async fn set_merged(&self, pr_id: &str) -> Result<PullRequest> {
        let mut state = self.state.write().await;
        let pull_request = state.pull_request_mut(pr_id)?;
        pull_request.status = PullRequestStatus::Merged;
        if pull_request.merged_at.is_none() {
            pull_request.merged_at = Some(Utc::now());
        }
        Ok(pull_request.clone())
    }

    async fn list_assigned_reviewers(&self, pr_id: &str) -> Result<Vec<String>> {
        // Matches a reviewer-table query: an unknown pull request has no reviewers.
        Ok(self
            .state
            .read()
            .await
            .pull_requests
            .get(pr_id)
            .map(|record| record.pull_request.assigned_reviewers.clone())
            .unwrap_or_default())
    }

    async fn replace_reviewer(
        &self,
        pr_id: &str,
        old_id: &str,
        new_id: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(new_id) = new_id {
            if !state.users.contains_key(new_id) {
                return Err(Error::storage(format!(
                    "reviewer {new_id} references an unknown user"
                )));
            }
        }

        let pull_request = state
            .pull_requests
            .get_mut(pr_id)
            .map(|record| &mut record.pull_request)
            .ok_or(Error::ReviewerNotAssigned)?;
        let position = pull_request
            .assigned_reviewers
            .iter()
            .position(|id| id == old_id)
            .ok_or(Error::ReviewerNotAssigned)?;

        if let Some(new_id) = new_id {
            if pull_request.has_reviewer(new_id) && new_id != old_id {
                return Err(Error::storage(format!(
                    "reviewer {new_id} is already assigned to {pr_id}"
                )));
            }
        }

        pull_request.assigned_reviewers.remove(position);
        if let Some(new_id) = new_id {
            pull_request.assigned_reviewers.push(new_id.to_string());
        }
        Ok(())
    }

    async fn list_review_pull_requests(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        let state = self.state.read().await;
        let mut records: Vec<&PullRequestRecord> = state
            .pull_requests
            .values()
            .filter(|record| record.pull_request.has_reviewer(user_id))
            .collect();
        records.sort_by(|a, b| {
            newest_first(&a.pull_request.created_at, &b.pull_request.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(records
            .into_iter()
            .map(|record| record.pull_request.short())
            .collect())
    }

    async fn list_open_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<HashMap<String, Vec<PullRequest>>> {
        let state = self.state.read().await;
        let mut open: Vec<&PullRequestRecord> = state
            .pull_requests
            .values()
            .filter(|record| record.pull_request.status == PullRequestStatus::Open)
            .collect();
        open.sort_by_key(|record| record.seq);

        let mut result: HashMap<String, Vec<PullRequest>> = HashMap::new();
        for reviewer_id in reviewer_ids {
            if result.contains_key(reviewer_id) {
                continue;
            }
            let reviewing: Vec<PullRequest> = open
                .iter()
                .filter(|record| record.pull_request.has_reviewer(reviewer_id))
                .map(|record| record.pull_request.clone())
                .collect();
            if !reviewing.is_empty() {
                result.insert(reviewer_id.clone(), reviewing);
            }
        }
        Ok(result)
    }

    async fn update_need_more_reviewers(&self, pr_id: &str, need_more: bool) -> Result<()> {
        let mut state = self.state.write().await;
        // An UPDATE matching no row is not an error.
        if let Ok(pull_request) = state.pull_request_mut(pr_id) {
            pull_request.need_more_reviewers = need_more;
        }
        Ok(())
    }
}

fn newest_first(a: &DateTime<Utc>, b: &DateTime<Utc>) -> std::cmp::Ordering {
    b.cmp(a)
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn count_assignments_by_reviewer(&self) -> Result<HashMap<String, u64>> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for record in state.pull_requests.values() {
            for reviewer in &record.pull_request.assigned_reviewers {
                *counts.entry(reviewer.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn count_open_pull_requests(&self) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .pull_requests
            .values()
            .filter(|record| record.pull_request.status == PullRequestStatus::Open)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_team(
                "backend",
                &[
                    TeamMember::new("u1", "alice"),
                    TeamMember::new("u2", "bob"),
                    TeamMember::new("u3", "carol").with_active(false),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_team_duplicate_name() {
        let store = seeded_store().await;
        let err = store.create_team("backend", &[]).await.unwrap_err();
        assert!(matches!(err, Error::TeamExists));
    }

    #[tokio::test]
    async fn test_create_team_moves_existing_user() {
        let store = seeded_store().await;
        store
            .create_team("frontend", &[TeamMember::new("u2", "bobby")])
            .await
            .unwrap();

        let user = store.get_user("u2").await.unwrap();
        assert_eq!(user.team_name, "frontend");
        assert_eq!(user.username, "bobby");

        let backend = store.get_team("backend").await.unwrap();
        assert!(backend.members.iter().all(|m| m.user_id != "u2"));
    }

    #[tokio::test]
    async fn test_list_active_members_distinguishes_missing_team() {
        let store = seeded_store().await;
        store.create_team("empty", &[]).await.unwrap();

        assert!(store.list_active_members("empty").await.unwrap().is_empty());
        assert!(matches!(
            store.list_active_members("ghost").await.unwrap_err(),
            Error::TeamNotFound
        ));

        let active = store.list_active_members("backend").await.unwrap();
        let ids: Vec<_> = active.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_bulk_set_active_rejects_foreign_user_atomically() {
        let store = seeded_store().await;
        store
            .create_team("frontend", &[TeamMember::new("u9", "zed")])
            .await
            .unwrap();

        let err = store
            .bulk_set_active("backend", &["u1".into(), "u9".into()], false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound));
        assert!(store.get_user("u1").await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_bulk_set_active_whole_team() {
        let store = seeded_store().await;
        let updated = store.bulk_set_active("backend", &[], false).await.unwrap();
        assert_eq!(updated.len(), 3);
        assert!(store.list_active_members("backend").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_reviewer_requires_assignment() {
        let store = seeded_store().await;
        store
            .create(&PullRequest::open("pr-1", "x", "u1", vec!["u2".into()]))
            .await
            .unwrap();

        let err = store.replace_reviewer("pr-1", "u3", Some("u1")).await.unwrap_err();
        assert!(matches!(err, Error::ReviewerNotAssigned));

        store.replace_reviewer("pr-1", "u2", Some("u3")).await.unwrap();
        assert_eq!(store.list_assigned_reviewers("pr-1").await.unwrap(), vec!["u3"]);

        store.replace_reviewer("pr-1", "u3", None).await.unwrap();
        assert!(store.list_assigned_reviewers("pr-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_pull_request_errors() {
        let store = seeded_store().await;
        let pr = PullRequest::open("pr-1", "x", "u1", Vec::new());
        store.create(&pr).await.unwrap();

        assert!(matches!(store.create(&pr).await.unwrap_err(), Error::PullRequestExists));

        let orphan = PullRequest::open("pr-2", "x", "nobody", Vec::new());
        assert!(matches!(store.create(&orphan).await.unwrap_err(), Error::AuthorNotFound));
    }

    #[tokio::test]
    async fn test_set_merged_keeps_first_timestamp() {
        let store = seeded_store().await;
        store
            .create(&PullRequest::open("pr-1", "x", "u1", Vec::new()))
            .await
            .unwrap();

        let first = store.set_merged("pr-1").await.unwrap();
        let second = store.set_merged("pr-1").await.unwrap();
        assert_eq!(first.status, PullRequestStatus::Merged);
        assert_eq!(first.merged_at, second.merged_at);

        assert!(matches!(
            store.set_merged("missing").await.unwrap_err(),
            Error::PullRequestNotFound
        ));
    }

    #[tokio::test]
    async fn test_list_open_by_reviewers_skips_merged() {
        let store = seeded_store().await;
        store
            .create(&PullRequest::open("pr-1", "a", "u1", vec!["u2".into()]))
            .await
            .unwrap();
        store
            .create(&PullRequest::open("pr-2", "b", "u1", vec!["u2".into()]))
            .await
            .unwrap();
        store.set_merged("pr-2").await.unwrap();

        let open = store.list_open_by_reviewers(&["u2".into(), "u1".into()]).await.unwrap();
        assert_eq!(open.len(), 1);
        let ids: Vec<_> = open["u2"].iter().map(|pr| pr.id.as_str()).collect();
        assert_eq!(ids, vec!["pr-1"]);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let store = seeded_store().await;
        store
            .create(&PullRequest::open("pr-1", "a", "u1", vec!["u2".into()]))
            .await
            .unwrap();
        store
            .create(&PullRequest::open("pr-2", "b", "u1", vec!["u2".into(), "u3".into()]))
            .await
            .unwrap();
        store.set_merged("pr-1").await.unwrap();

        let counts = store.count_assignments_by_reviewer().await.unwrap();
        assert_eq!(counts.get("u2"), Some(&2));
        assert_eq!(counts.get("u3"), Some(&1));
        assert_eq!(store.count_open_pull_requests().await.unwrap(), 1);
    }
}
