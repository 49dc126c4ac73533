use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{blog::BlogError, pagination::PaginationError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Blog(#[from] BlogError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] PaginationError),
    #[error("resource not found")]
    NotFound,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Exit status reported by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidArgument(_)
            | AppError::Domain(_)
            | AppError::Blog(BlogError::Domain(_) | BlogError::SlugTaken { .. }) => 2,
            AppError::NotFound => 3,
            AppError::Infra(_)
            | AppError::Repo(_)
            | AppError::Blog(BlogError::Repo(_) | BlogError::Slug(_))
            | AppError::Unexpected(_) => 1,
        }
    }

    /// The error message followed by every message in its source chain.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if messages.last() != Some(&message) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_caller_mistakes_from_failures() {
        let invalid = AppError::from(PaginationError::Negative {
            field: "count",
            value: -1,
        });
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(AppError::NotFound.exit_code(), 3);
        assert_eq!(
            AppError::from(RepoError::from_persistence("disk full")).exit_code(),
            1
        );
        let taken = AppError::from(BlogError::SlugTaken {
            slug: "hello".into(),
        });
        assert_eq!(taken.exit_code(), 2);
    }

    #[test]
    fn chain_skips_transparent_duplicates() {
        let err = AppError::from(BlogError::from(RepoError::from_persistence("disk full")));
        assert_eq!(err.chain(), vec!["persistence error: disk full".to_string()]);
    }
}
