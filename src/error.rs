//! Unified error handling for the roster crate
//!
//! Every operation reports failures through the closed [`Error`] enum. Storage
//! adapters translate their driver errors into the domain kinds they recognise
//! (unique / foreign-key violations, missing rows) and pass everything else
//! through as [`Error::Storage`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use roster::error::{Error, ErrorCategory};
//!
//! match engine.reassign_reviewer("pr-1", "u2").await {
//!     Ok(result) => println!("replaced by {}", result.replaced_by),
//!     Err(err) if err.category() == ErrorCategory::Conflict => eprintln!("{}", err.code()),
//!     Err(err) => return Err(err.into()),
//! }
//! ```

use thiserror::Error;

/// Classification of errors for an outer transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller supplied empty or malformed arguments
    Validation,
    /// A referenced entity does not exist
    NotFound,
    /// The request conflicts with current state
    Conflict,
    /// The persistence collaborator failed
    Storage,
}

/// Domain error kinds
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("team not found")]
    TeamNotFound,

    #[error("team already exists")]
    TeamExists,

    #[error("user not found")]
    UserNotFound,

    #[error("author not found")]
    AuthorNotFound,

    #[error("pull request not found")]
    PullRequestNotFound,

    #[error("pull request already exists")]
    PullRequestExists,

    #[error("pull request is merged")]
    PullRequestMerged,

    #[error("reviewer is not assigned to this pull request")]
    ReviewerNotAssigned,

    #[error("no active replacement candidate available")]
    NoCandidate,

    /// Anything raised by the persistence layer that has no domain meaning
    #[error("storage failure: {context}")]
    Storage {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create an invalid input error naming what was wrong
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a storage error with context only
    pub fn storage(context: impl Into<String>) -> Self {
        Self::Storage {
            context: context.into(),
            source: None,
        }
    }

    /// Create a storage error wrapping the driver error
    pub fn storage_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::TeamNotFound
            | Self::UserNotFound
            | Self::AuthorNotFound
            | Self::PullRequestNotFound => ErrorCategory::NotFound,
            Self::TeamExists
            | Self::PullRequestExists
            | Self::PullRequestMerged
            | Self::ReviewerNotAssigned
            | Self::NoCandidate => ErrorCategory::Conflict,
            Self::Storage { .. } => ErrorCategory::Storage,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "BAD_REQUEST",
            Self::TeamNotFound
            | Self::UserNotFound
            | Self::AuthorNotFound
            | Self::PullRequestNotFound => "NOT_FOUND",
            Self::TeamExists => "TEAM_EXISTS",
            Self::PullRequestExists => "PR_EXISTS",
            Self::PullRequestMerged => "PR_MERGED",
            Self::ReviewerNotAssigned => "NOT_ASSIGNED",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::Storage { .. } => "INTERNAL",
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::storage_with_source("postgres query failed", err)
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::storage_with_source("postgres pool unavailable", err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
