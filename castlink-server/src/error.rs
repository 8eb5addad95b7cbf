//! Error types for castlink-server
//!
//! Module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for castlink-server
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Counter deltas must be positive
    #[error("Invalid counter delta: {0}")]
    InvalidDelta(f64),

    /// Milestone lists must be strictly ascending with positive thresholds
    #[error("Invalid milestone configuration: {0}")]
    InvalidMilestones(String),

    /// Vote operation while no session is accepting casts
    #[error("No vote session is running")]
    VoteNotRunning,

    /// Vote cast for an option outside the session's option list
    #[error("Invalid vote option: {0}")]
    InvalidVoteOption(usize),

    /// Vote session parameters rejected
    #[error("Invalid vote session: {0}")]
    InvalidVoteSession(String),

    /// Speech synthesis failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Audio playback failed
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<castlink_common::Error> for Error {
    fn from(e: castlink_common::Error) -> Self {
        match e {
            castlink_common::Error::Io(e) => Error::Io(e),
            castlink_common::Error::Config(msg) => Error::Config(msg),
            castlink_common::Error::NotFound(msg) => Error::NotFound(msg),
            castlink_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            castlink_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Convenience Result type using castlink-server Error
pub type Result<T> = std::result::Result<T, Error>;
