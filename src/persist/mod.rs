//! Record store abstraction over the `operations` table.

pub mod sqlite;

use thiserror::Error;

use crate::{
    operation::{Operation, OperationDraft, OperationFilter},
    types::OperationId,
};

/// Store-level failure, surfaced to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Driver, constraint, or connectivity failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failure reported by a store backend that has no driver error to wrap.
    #[error("{0}")]
    Message(String),
}

/// Result alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Insert/filter access to persisted operations.
pub trait OperationStore: Send {
    /// Inserts one row and returns its generated id.
    fn insert(&mut self, draft: &OperationDraft) -> StoreResult<OperationId>;
    /// Returns all rows matching `filter`, ordered by ascending id.
    fn query(&self, filter: &OperationFilter) -> StoreResult<Vec<Operation>>;
    /// Pushes buffered writes to durable storage.
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
