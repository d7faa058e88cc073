//! Typed errors for the recommendation engine.
//!
//! Engine operations never hand these to their callers: each one is logged
//! and turned into an empty or default result at the component boundary.
//! They exist so that the internal paths (`try_*` functions, the remote
//! backend) can use `?` and say precisely what went wrong.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures inside the local engine.
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    /// The corpus could not be read at startup.
    #[error("Corpus unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    /// A seed or lookup id is not in the corpus.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Mood name outside the fixed table.
    #[error("Unknown mood: {0}")]
    UnknownMood(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Failures of the remote vector index. Any of them trips the circuit breaker.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Remote index timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote index answered with HTTP {0}")]
    Status(u16),

    #[error("Remote index transport error: {0}")]
    Transport(String),

    #[error("Remote index response could not be decoded: {0}")]
    Decode(String),
}

/// Convenience Result type for engine internals.
pub type Result<T> = std::result::Result<T, EngineError>;
