//! Error types for RankMate
//!
//! This module defines all error types used throughout the RankMate runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! The error taxonomy mirrors how failures propagate through the agent loop:
//! tool- and parse-level failures are converted into tool-result messages the
//! model consumes (they never appear here); only registry-fatal and turn-fatal
//! conditions surface as `RankError` values.

use thiserror::Error;

/// The primary error type for RankMate operations.
#[derive(Error, Debug)]
pub enum RankError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider errors (API failures, transport errors, malformed responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool registry errors (no requested tool could be resolved)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Tool execution errors (invalid parameters, execution failures, timeouts)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session management errors (invalid state, store failures)
    #[error("Session error: {0}")]
    Session(String),

    /// A turn is already in flight for this session; concurrent turns are
    /// rejected, not queued.
    #[error("Turn already in progress for session: {0}")]
    TurnInProgress(String),

    /// Model output did not match the action grammar. Recoverable inside the
    /// agent loop; only surfaces if callers invoke the parser directly.
    #[error("Malformed action: {0}")]
    Action(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for RankMate operations.
pub type Result<T> = std::result::Result<T, RankError>;
