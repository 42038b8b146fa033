use thiserror::Error;

use leasehold_core::StoreError;

/// A handler gave up on a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl std::fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_urlencoded::de::Error> for HandlerError {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        Self(e.to_string())
    }
}

/// Everything that can go wrong between route match and response.
///
/// `Clone` because one outcome is shared by every request joined onto the
/// same in-flight computation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Invalid result from handler: {0}")]
    InvalidResult(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<minijinja::Error> for DispatchError {
    fn from(e: minijinja::Error) -> Self {
        Self::Template(e.to_string())
    }
}
