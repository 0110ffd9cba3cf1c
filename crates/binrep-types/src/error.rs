use thiserror::Error;

/// Errors produced while parsing or validating binrep types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid repository name {value:?}: {reason}")]
    InvalidName { value: String, reason: String },
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
