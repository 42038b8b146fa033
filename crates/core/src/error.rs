use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// A task or controller definition that cannot be used. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{id}: missing executable")]
    MissingExec { id: String },

    #[error("{id}: interval must be a positive number of seconds, got {span}")]
    InvalidSpan { id: String, span: i64 },

    #[error("{id}: offset must not be negative, got {offset}")]
    InvalidOffset { id: String, offset: i64 },

    #[error("{id}: shard count must be positive, got {iterations}")]
    InvalidIterations { id: String, iterations: i64 },

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Other(String),
}
