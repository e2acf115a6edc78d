//! Runtime event stream payloads.

use crate::types::OperationId;

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    /// A new operation row was inserted.
    Inserted {
        /// Inserted operation id.
        id: OperationId,
    },
    /// An archived report was removed because its row could not be inserted.
    ArchiveDiscarded {
        /// Report name that was removed.
        filename: String,
    },
}
