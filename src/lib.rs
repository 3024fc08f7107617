//! roster - pull request reviewer assignment and rebalancing
//!
//! Tracks pull requests and their reviewers for teams of engineers: picks
//! reviewers when a pull request is opened, swaps reviewers on demand, repairs
//! open reviews when team members are deactivated, and reports reviewer load.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`engine`] - Use cases: assignment, reassignment, deactivation cascade, stats
//! - [`models`] - Core data structures and types
//! - [`random`] - Thread-safe seeded randomness source
//! - [`storage`] - Repository ports with in-memory and PostgreSQL adapters
//! - [`error`] - Closed error kinds
//! - [`logging`] - Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use roster::config::Config;
//! use roster::engine::ReviewEngine;
//! use roster::storage::PostgresStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     roster::logging::init(&config.logging)?;
//!
//!     let store = Arc::new(PostgresStore::connect(&config.database).await?);
//!     let engine = ReviewEngine::with_config(store, &config.assignment);
//!
//!     let pr = engine.create_pull_request("pr-1", "Add search", "u1").await?;
//!     println!("reviewers: {:?}", pr.assigned_reviewers);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod random;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{DeactivateResult, ReassignResult, ReviewEngine};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{
        PullRequest, PullRequestShort, PullRequestStatus, Stats, Team, TeamMember, User,
    };
    pub use crate::random::SafeRandom;
    pub use crate::storage::{
        DirectoryRepository, MemoryStore, PostgresStore, PullRequestRepository, StatsRepository,
    };
}

// Direct re-exports for convenience
pub use engine::ReviewEngine;
pub use error::{Error, Result};
pub use models::{PullRequest, PullRequestStatus, REQUIRED_REVIEWERS};
