//! Process-wide operation log runtime.

/// Runtime event stream payloads.
pub mod events;
/// Single-writer runtime handle and task.
pub mod handle;
