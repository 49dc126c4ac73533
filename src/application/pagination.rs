//! Offset pagination over the visible post sequence.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("`{field}` must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },
    #[error("`{field}` exceeds the supported range (got {value})")]
    OutOfRange { field: &'static str, value: i64 },
}

/// A `count`/`skip` pair; negative inputs are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    count: usize,
    skip: usize,
}

impl PageWindow {
    /// Build a window from caller-supplied integers (query string, CLI flags).
    pub fn new(count: i64, skip: i64) -> Result<Self, PaginationError> {
        Ok(Self {
            count: non_negative("count", count)?,
            skip: non_negative("skip", skip)?,
        })
    }

    pub fn first(count: usize) -> Self {
        Self { count, skip: 0 }
    }

    pub fn skipping(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn apply<I>(&self, items: I) -> impl Iterator<Item = I::Item>
    where
        I: IntoIterator,
    {
        items.into_iter().skip(self.skip).take(self.count)
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<usize, PaginationError> {
    if value < 0 {
        return Err(PaginationError::Negative { field, value });
    }
    usize::try_from(value).map_err(|_| PaginationError::OutOfRange { field, value })
}
