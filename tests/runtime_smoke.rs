use std::{fs, io::Read, path::Path, time::Duration};

use chrono::Local;
use flate2::read::GzDecoder;
use tempfile::TempDir;

use missionlog::{
    archive::ReportArchiver,
    operation::{Operation, OperationDraft, OperationFields, OperationFilter},
    persist::{OperationStore, StoreError, StoreResult, sqlite::SqliteOperationStore},
    runtime::{
        events::OperationEvent,
        handle::{RuntimeConfig, RuntimeError, spawn_oplog},
    },
    types::OperationId,
};

fn fields(mission: &str, duration: &str) -> OperationFields {
    OperationFields::from_pairs([
        ("worldName", "Altis"),
        ("missionName", mission),
        ("missionDuration", duration),
        ("filename", "client-chosen.json"),
        ("type", "TvT"),
    ])
}

fn archive_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read_dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

struct RejectingStore;

impl OperationStore for RejectingStore {
    fn insert(&mut self, _draft: &OperationDraft) -> StoreResult<OperationId> {
        Err(StoreError::Message("constraint violated".to_string()))
    }

    fn query(&self, _filter: &OperationFilter) -> StoreResult<Vec<Operation>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn add_archives_inserts_and_emits_event() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let store = SqliteOperationStore::open_in_memory().expect("open");
    let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let payload = br#"{"frames":[0,1,2]}"#.to_vec();
    let op = handle.add(fields("Domination", "3600.5"), payload.clone()).await.expect("add");

    assert_eq!(op.mission_duration, 3600.5);
    assert_eq!(op.date, Local::now().date_naive());
    assert_ne!(op.filename, "client-chosen.json");
    assert!(op.filename.ends_with(".json"));

    let mut decoded = Vec::new();
    GzDecoder::new(fs::File::open(tmp.path().join(format!("{}.gz", op.filename))).expect("open archive"))
        .read_to_end(&mut decoded)
        .expect("gunzip");
    assert_eq!(decoded, payload);

    let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv");
    assert_eq!(evt, OperationEvent::Inserted { id: op.id });

    let listed = handle.query(OperationFilter::default()).await.expect("query");
    assert_eq!(listed, vec![op]);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn invalid_duration_blocks_archive_and_insert() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let store = SqliteOperationStore::open_in_memory().expect("open");
    let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());

    let err = handle
        .add(fields("Domination", "an hour"), b"{}".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));

    assert!(archive_entries(tmp.path()).is_empty());
    assert!(handle.query(OperationFilter::default()).await.expect("query").is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_insert_discards_archived_report() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let handle = spawn_oplog(Box::new(RejectingStore), archiver, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let err = handle.add(fields("Domination", "10"), b"{}".to_vec()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
    assert!(archive_entries(tmp.path()).is_empty());

    let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv");
    assert!(matches!(evt, OperationEvent::ArchiveDiscarded { .. }));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_insert_can_leave_archive_when_discard_disabled() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let cfg = RuntimeConfig {
        discard_orphaned_archives: false,
        ..RuntimeConfig::default()
    };
    let handle = spawn_oplog(Box::new(RejectingStore), archiver, cfg);

    let err = handle.add(fields("Domination", "10"), b"{}".to_vec()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
    assert_eq!(archive_entries(tmp.path()).len(), 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn calls_after_shutdown_report_closed_channel() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let store = SqliteOperationStore::open_in_memory().expect("open");
    let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());
    let clone = handle.clone();

    handle.shutdown().await.expect("shutdown");

    let err = clone.query(OperationFilter::default()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ChannelClosed));
}

#[tokio::test]
async fn concurrent_adds_get_distinct_ids_and_files() {
    let tmp = TempDir::new().expect("tmp");
    let archiver = ReportArchiver::new(tmp.path()).expect("archiver");
    let store = SqliteOperationStore::open_in_memory().expect("open");
    let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.add(fields(&format!("Op {i}"), "1"), format!("payload {i}").into_bytes())
                .await
        }));
    }

    let mut ids = Vec::new();
    let mut files = Vec::new();
    for task in tasks {
        let op = task.await.expect("join").expect("add");
        ids.push(op.id);
        files.push(op.filename);
    }
    ids.sort();
    ids.dedup();
    files.sort();
    files.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(files.len(), 8);
    assert_eq!(archive_entries(tmp.path()).len(), 8);

    handle.shutdown().await.expect("shutdown");
}
