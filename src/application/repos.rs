//! Backend trait describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::posts::Post;

/// Failure to durably read or write through a backend.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Capabilities every storage backend provides.
///
/// Implementations only move bytes; ordering, visibility and identity
/// assignment live in the repository so all backends behave alike.
#[async_trait]
pub trait PostBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read the complete persisted post set.
    async fn load_all(&self) -> Result<Vec<Post>, RepoError>;

    /// Insert or replace the post keyed by `post.id`.
    async fn persist(&self, post: &Post) -> Result<(), RepoError>;

    /// Delete the post keyed by `post.id`. Deleting a missing post succeeds.
    async fn erase(&self, post: &Post) -> Result<(), RepoError>;

    /// Store an attachment and return a stable reference (usually a URL path).
    async fn store_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        suffix: Option<&str>,
    ) -> Result<String, RepoError>;
}
