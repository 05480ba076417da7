//! Error types for the remote store

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Remote request failed: {0}")]
    Request(String),

    /// A unique constraint rejected the insert (e.g. a question already
    /// reported by this user).
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote returned invalid data: {0}")]
    InvalidData(String),

    #[error("Mock response not configured for: {0}")]
    NotConfigured(String),
}

impl RemoteError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
