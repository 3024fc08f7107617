// Core data structures for the reviewer roster

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Number of reviewers every pull request aims for
pub const REQUIRED_REVIEWERS: usize = 2;

/// Pull request lifecycle state (Open -> Merged, never back)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    #[default]
    Open,
    Merged,
}

impl PullRequestStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(format!("unknown pull request status: {other}")),
        }
    }
}

/// A pull request with its assigned reviewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// Reviewer ids in assignment order; never contains `author_id`, never duplicates
    pub assigned_reviewers: Vec<String>,
    pub need_more_reviewers: bool,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Create a new open pull request with the given reviewers
    ///
    /// `need_more_reviewers` is derived from the reviewer count.
    pub fn open(
        id: impl Into<String>,
        name: impl Into<String>,
        author_id: impl Into<String>,
        reviewers: Vec<String>,
    ) -> Self {
        let need_more_reviewers = needs_more_reviewers(reviewers.len());
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
            status: PullRequestStatus::Open,
            assigned_reviewers: reviewers,
            need_more_reviewers,
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    /// Check whether the user is currently one of the reviewers
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|id| id == user_id)
    }

    /// Short listing form
    pub fn short(&self) -> PullRequestShort {
        PullRequestShort {
            id: self.id.clone(),
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// Compact pull request form used in per-user review listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// A user as resolved by the directory, including its team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// A member entry of a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl TeamMember {
    /// Create an active member
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active: true,
        }
    }

    /// Set the active flag
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// A named team and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn new(name: impl Into<String>, members: Vec<TeamMember>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

/// Reviewer load rollup, derived at read time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Reviewer id -> number of pull requests they are assigned to
    pub assignments_by_user: HashMap<String, u64>,
    /// Number of pull requests with status Open
    pub open_pull_requests: u64,
}

impl Stats {
    /// Total number of reviewer slots currently filled
    pub fn total_assignments(&self) -> u64 {
        self.assignments_by_user.values().sum()
    }
}

/// `need_more_reviewers` rule, applied after every reviewer mutation
pub fn needs_more_reviewers(reviewer_count: usize) -> bool {
    reviewer_count < REQUIRED_REVIEWERS
}
