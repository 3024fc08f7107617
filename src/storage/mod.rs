//! Persistence ports and adapters
//!
//! The engine never talks to a database directly. It depends on three narrow
//! capability sets, each a trait in this module:
//!
//! - [`DirectoryRepository`] - teams and users
//! - [`PullRequestRepository`] - pull requests and their reviewer sets
//! - [`StatsRepository`] - read-only aggregation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ReviewEngine                          │
//! │      assignment · reassignment · cascade · stats · team     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   DirectoryRepository · PullRequestRepository · Stats...    │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                          │
//!                   ▼                          ▼
//!          ┌─────────────────┐        ┌─────────────────┐
//!          │   PostgreSQL    │        │    In-memory    │
//!          │     adapter     │        │     adapter     │
//!          └─────────────────┘        └─────────────────┘
//! ```
//!
//! Adapters must report domain conditions with the matching [`Error`](crate::Error)
//! kind (`TeamNotFound`, `ReviewerNotAssigned`, ...) and everything else as
//! `Error::Storage`.

pub mod memory;
pub mod migrate;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{PullRequest, PullRequestShort, Team, TeamMember, User};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// ============================================================================
// Repository Traits
// ============================================================================

/// Team and user persistence
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Create a team and upsert its members in one transaction
    ///
    /// Fails with `TeamExists` if the name is taken.
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<Team>;

    /// Get a team with its members, or `TeamNotFound`
    async fn get_team(&self, name: &str) -> Result<Team>;

    /// Resolve a user, or `UserNotFound`
    async fn get_user(&self, user_id: &str) -> Result<User>;

    /// Flip a single user's active flag, or `UserNotFound`
    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User>;

    /// List the active members of a team
    ///
    /// An empty result for a team that does not exist is reported as
    /// `TeamNotFound`, never as an empty list.
    async fn list_active_members(&self, team_name: &str) -> Result<Vec<User>>;

    /// Set the active flag on the named users, or on every member when
    /// `user_ids` is empty
    ///
    /// Fails with `TeamNotFound` for an unknown team and with `UserNotFound`
    /// if an explicitly named id is not a member. Nothing is changed on failure.
    async fn bulk_set_active(
        &self,
        team_name: &str,
        user_ids: &[String],
        is_active: bool,
    ) -> Result<Vec<User>>;
}

/// Pull request persistence
#[async_trait]
pub trait PullRequestRepository: Send + Sync {
    /// Store a new pull request together with its reviewers
    ///
    /// `PullRequestExists` on id collision, `AuthorNotFound` if the author is
    /// not a known user.
    async fn create(&self, pull_request: &PullRequest) -> Result<PullRequest>;

    /// Load a pull request, or `PullRequestNotFound`
    async fn get(&self, pr_id: &str) -> Result<PullRequest>;

    /// Mark a pull request merged; `merged_at` is only set the first time
    async fn set_merged(&self, pr_id: &str) -> Result<PullRequest>;

    /// Current reviewer ids in assignment order
    async fn list_assigned_reviewers(&self, pr_id: &str) -> Result<Vec<String>>;

    /// Atomically remove `old_id` and, when given, add `new_id`
    ///
    /// `ReviewerNotAssigned` if `old_id` is not currently assigned.
    async fn replace_reviewer(&self, pr_id: &str, old_id: &str, new_id: Option<&str>)
        -> Result<()>;

    /// Every pull request the user reviews, newest first
    async fn list_review_pull_requests(&self, user_id: &str) -> Result<Vec<PullRequestShort>>;

    /// Open pull requests keyed by each given reviewer id
    async fn list_open_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<HashMap<String, Vec<PullRequest>>>;

    /// Persist the `need_more_reviewers` flag
    async fn update_need_more_reviewers(&self, pr_id: &str, need_more: bool) -> Result<()>;
}

/// Read-only aggregation over pull requests
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Reviewer id -> number of pull requests assigned, any status
    async fn count_assignments_by_reviewer(&self) -> Result<HashMap<String, u64>>;

    /// Number of pull requests with status Open
    async fn count_open_pull_requests(&self) -> Result<u64>;
}

// ============================================================================
// Shared Repository Types
// ============================================================================

pub type SharedDirectoryRepository = Arc<dyn DirectoryRepository>;
pub type SharedPullRequestRepository = Arc<dyn PullRequestRepository>;
pub type SharedStatsRepository = Arc<dyn StatsRepository>;

/// Create a shared in-memory store
pub fn create_memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
