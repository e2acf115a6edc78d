//! Mission-report archive service: SQLite-backed operation records, gzip
//! report archiving, and a small HTTP surface for listing and uploads.
//!
//! # Examples
//!
//! Direct store usage with [`persist::sqlite::SqliteOperationStore`]:
//! ```
//! use chrono::NaiveDate;
//! use missionlog::{
//!     operation::{OperationDraft, OperationFields, OperationFilter},
//!     persist::{OperationStore, sqlite::SqliteOperationStore},
//! };
//!
//! let mut store = SqliteOperationStore::open_in_memory().expect("open");
//! let fields = OperationFields::from_pairs([
//!     ("worldName", "Altis"),
//!     ("missionName", "Domination"),
//!     ("missionDuration", "3600.5"),
//!     ("type", "TvT"),
//! ]);
//! let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
//! let draft = OperationDraft::from_fields_on(fields, date).expect("draft");
//! let id = store.insert(&draft).expect("insert");
//!
//! let filter = OperationFilter::from_params("", "Domin", "2024-12-31", "2024-01-01").expect("filter");
//! let found = store.query(&filter).expect("query");
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].id, id);
//! ```
//!
//! Runtime usage with an archive directory:
//! ```no_run
//! use missionlog::{
//!     archive::ReportArchiver,
//!     operation::{OperationFields, OperationFilter},
//!     persist::sqlite::SqliteOperationStore,
//!     runtime::handle::{RuntimeConfig, spawn_oplog},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteOperationStore::open("data.db").expect("open sqlite");
//! let archiver = ReportArchiver::new("static/data").expect("archive dir");
//! let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());
//! let fields = OperationFields::from_pairs([("missionName", "Domination"), ("missionDuration", "95")]);
//! let op = handle.add(fields, b"{}".to_vec()).await.expect("add");
//! let all = handle.query(OperationFilter::default()).await.expect("query");
//! assert!(all.iter().any(|o| o.id == op.id));
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Gzip report archiver.
pub mod archive;
/// Options file and server settings.
pub mod config;
/// Operation records, input fields and filters.
pub mod operation;
/// Store abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
/// HTTP router and handlers.
pub mod web;
