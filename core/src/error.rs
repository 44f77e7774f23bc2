//! Error taxonomy for the execution core.
//!
//! Validation and lookup failures are the caller's fault: they are returned
//! synchronously and never logged as incidents. Launch failures and timeouts
//! are not errors at this level; they are reported as execution results so
//! the caller can tell "your request was invalid" apart from "the system
//! could not run the tool".

use thiserror::Error;

/// A request defect the caller can correct. Nothing is executed when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("unknown parameter for this tool: {0}")]
    UnknownParameter(String),

    #[error("invalid value {value:?} for {param} (allowed: {allowed})")]
    InvalidEnum {
        param: String,
        value: String,
        allowed: String,
    },

    #[error("invalid characters in {param}: {value:?}")]
    InvalidCharacters { param: String, value: String },

    #[error("path parameter {param} rejected: {reason}")]
    InvalidPath { param: String, reason: String },

    #[error("denylisted token in {param}: {token:?}")]
    DeniedToken { param: String, token: String },

    #[error("unparseable value for {param}")]
    Unparseable { param: String },
}

/// Terminal outcome of `Coordinator::execute` before any process is spawned.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
