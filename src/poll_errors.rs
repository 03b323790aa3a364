//! # Poll Error Types Module
//!
//! Error taxonomy shared by the poll registry, the vote ledger and the
//! conversation handlers. Every variant is scoped to the single interaction
//! that produced it; none of them is fatal to the process.

use thiserror::Error;

/// Errors produced while handling a poll interaction
#[derive(Debug, Error)]
pub enum PollError {
    /// The text given as a poll number is not an integer
    #[error("invalid poll id: {0:?}")]
    InvalidPollId(String),
    /// The text given as a poll title is blank or too long
    #[error("invalid poll title: {0}")]
    InvalidTitle(&'static str),
    /// A vote payload that is not `"<poll id> <0|1>"`
    #[error("invalid vote payload: {0:?}")]
    InvalidVote(String),
    /// No poll with this id exists
    #[error("poll #{0} not found")]
    NotFound(i64),
    /// The poll exists but the requester is not its owner
    #[error("poll #{0} is not owned by the requester")]
    Forbidden(i64),
    /// The persistence layer failed or did not confirm the write
    #[error("storage error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl PollError {
    /// Validation errors never touch the store and leave state as it was
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PollError::InvalidPollId(_) | PollError::InvalidTitle(_) | PollError::InvalidVote(_)
        )
    }
}

/// Result alias for poll operations
pub type PollResult<T> = Result<T, PollError>;
