//! Shared primitive IDs and configuration-supplied enumerations.

use serde::{Deserialize, Serialize};

/// Store-assigned operation identifier (SQLite rowid).
pub type OperationId = i64;

/// Known mission category, e.g. `{ key: "tvt", name: "TvT" }`.
///
/// Used for presentation only; inserted records are not checked against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGame {
    /// Short tag stored in the `type` column.
    pub key: String,
    /// Human-readable label.
    pub name: String,
}
