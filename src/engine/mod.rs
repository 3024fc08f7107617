//! Reviewer assignment and rebalancing engine
//!
//! [`ReviewEngine`] is the composition root: it owns the three repository
//! ports and the shared [`SafeRandom`], and exposes one async method per
//! use case. Each method reads current state, applies its rule and writes the
//! result back through the ports.
//!
//! # Modules
//!
//! - [`assignment`] - pull request creation, merge and per-user review lists
//! - [`reassignment`] - swapping one named reviewer for a fresh candidate
//! - [`cascade`] - repairing open pull requests after a team-wide deactivation
//! - [`stats`] - reviewer load rollup
//! - [`team`] - team creation and single-user activation
//!
//! # Consistency
//!
//! Single-entity writes are atomic inside the adapter. Multi-step operations
//! (reassignment, the deactivation cascade) are not: a concurrent caller can
//! interleave between the read of current reviewers and the replacement
//! write. Nothing is retried.
//!
//! # Quick Start
//!
//! ```ignore
//! use roster::engine::ReviewEngine;
//! use roster::random::SafeRandom;
//! use roster::storage::create_memory_store;
//!
//! let engine = ReviewEngine::from_store(create_memory_store(), SafeRandom::with_seed(7));
//! let pr = engine.create_pull_request("pr-1", "Add search", "u1").await?;
//! println!("reviewers: {:?}", pr.assigned_reviewers);
//! ```

pub mod assignment;
pub mod cascade;
pub mod reassignment;
pub mod stats;
pub mod team;

use std::sync::Arc;

use crate::config::AssignmentConfig;
use crate::error::{Error, Result};
use crate::random::SafeRandom;
use crate::storage::{
    DirectoryRepository, PullRequestRepository, SharedDirectoryRepository,
    SharedPullRequestRepository, SharedStatsRepository, StatsRepository,
};

pub use cascade::DeactivateResult;
pub use reassignment::ReassignResult;

/// Use-case facade over the repository ports
#[derive(Clone)]
pub struct ReviewEngine {
    directory: SharedDirectoryRepository,
    pull_requests: SharedPullRequestRepository,
    stats: SharedStatsRepository,
    random: Arc<SafeRandom>,
}

impl ReviewEngine {
    /// Wire an engine from independent adapters
    pub fn new(
        directory: SharedDirectoryRepository,
        pull_requests: SharedPullRequestRepository,
        stats: SharedStatsRepository,
        random: SafeRandom,
    ) -> Self {
        Self {
            directory,
            pull_requests,
            stats,
            random: Arc::new(random),
        }
    }

    /// Wire an engine from a single adapter implementing every port
    pub fn from_store<S>(store: Arc<S>, random: SafeRandom) -> Self
    where
        S: DirectoryRepository + PullRequestRepository + StatsRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store, random)
    }

    /// Wire an engine whose randomness follows the assignment config
    pub fn with_config<S>(store: Arc<S>, config: &AssignmentConfig) -> Self
    where
        S: DirectoryRepository + PullRequestRepository + StatsRepository + 'static,
    {
        Self::from_store(store, SafeRandom::from_seed_option(config.rng_seed))
    }

    pub fn random(&self) -> &SafeRandom {
        &self.random
    }
}

/// Reject empty identifiers with `InvalidInput`
pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_memory_store;

    #[test]
    fn test_require() {
        assert!(require("pr-1", "pull_request_id").is_ok());
        let err = require("", "pull_request_id").unwrap_err();
        assert_eq!(err.to_string(), "invalid input: pull_request_id is required");
        // Only the empty string is missing; blanks are passed through as ids.
        assert!(require("   ", "team_name").is_ok());
    }

    #[tokio::test]
    async fn test_with_config_seeds_random() {
        let config = AssignmentConfig { rng_seed: Some(5) };
        let a = ReviewEngine::with_config(create_memory_store(), &config);
        let b = ReviewEngine::with_config(create_memory_store(), &config);
        let pool: Vec<String> = (1..=8).map(|i| format!("u{i}")).collect();
        assert_eq!(a.random().pick(&pool, 2), b.random().pick(&pool, 2));
    }
}
