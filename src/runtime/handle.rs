use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

use crate::{
    archive::{ArchiveError, ReportArchiver},
    operation::{Operation, OperationDraft, OperationFields, OperationFilter, ValidationError},
    persist::{OperationStore, StoreError},
};

use super::events::OperationEvent;

/// Failure of a runtime command.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Request fields were rejected before any side effect.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The report could not be archived.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// The store rejected the insert or query.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A blocking worker panicked or was cancelled.
    #[error("runtime worker failed: {0}")]
    Worker(String),
    /// The runtime task has shut down.
    #[error("operation log runtime is not running")]
    ChannelClosed,
}

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Pending commands before callers wait.
    pub command_queue_bound: usize,
    /// Broadcast buffer for [`OperationEvent`]s.
    pub event_capacity: usize,
    /// Remove the archived report when its row cannot be inserted.
    pub discard_orphaned_archives: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            discard_orphaned_archives: true,
        }
    }
}

/// Cloneable handle to the task that owns the store and archiver.
#[derive(Clone)]
pub struct OperationLogHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<OperationEvent>,
}

enum Command {
    Add {
        fields: OperationFields,
        payload: Vec<u8>,
        resp: oneshot::Sender<Result<Operation, RuntimeError>>,
    },
    Query {
        filter: OperationFilter,
        resp: oneshot::Sender<Result<Vec<Operation>, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

type SharedStore = Arc<Mutex<Box<dyn OperationStore>>>;

/// Starts the runtime task. Must be called inside a tokio runtime.
///
/// Store and archive calls run on the blocking pool, one command at a time.
pub fn spawn_oplog(
    store: Box<dyn OperationStore>,
    archiver: ReportArchiver,
    config: RuntimeConfig,
) -> OperationLogHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<OperationEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let store: SharedStore = Arc::new(Mutex::new(store));
        let archiver = Arc::new(archiver);

        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &store, &archiver, &events_tx_loop, &config).await;
            if done {
                break;
            }
        }
    });

    OperationLogHandle { cmd_tx, events_tx }
}

impl OperationLogHandle {
    /// Subscribes to insert/discard events.
    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.events_tx.subscribe()
    }

    /// Validates `fields`, archives `payload`, then inserts the row.
    ///
    /// Returns the stored record with its generated id and archive name.
    pub async fn add(&self, fields: OperationFields, payload: Vec<u8>) -> Result<Operation, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Add {
                fields,
                payload,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Returns operations matching `filter`, ordered by id.
    pub async fn query(&self, filter: OperationFilter) -> Result<Vec<Operation>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Query { filter, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes and closes the store, then stops the task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    store: &SharedStore,
    archiver: &Arc<ReportArchiver>,
    events_tx: &broadcast::Sender<OperationEvent>,
    config: &RuntimeConfig,
) -> bool {
    match cmd {
        Command::Add {
            fields,
            payload,
            resp,
        } => {
            let res = add_operation(fields, payload, store, archiver, events_tx, config).await;
            let _ = resp.send(res);
        }
        Command::Query { filter, resp } => {
            let store_ref = Arc::clone(store);
            let res = run_blocking(move || store_ref.blocking_lock().query(&filter))
                .await
                .and_then(|r| r.map_err(RuntimeError::from));
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            let store_ref = Arc::clone(store);
            let res = run_blocking(move || store_ref.blocking_lock().flush())
                .await
                .and_then(|r| r.map_err(RuntimeError::from));
            if let Err(err) = &res {
                error!(error = %err, "store flush on shutdown failed");
            }
            let _ = resp.send(res);
            return true;
        }
    }

    false
}

async fn add_operation(
    fields: OperationFields,
    payload: Vec<u8>,
    store: &SharedStore,
    archiver: &Arc<ReportArchiver>,
    events_tx: &broadcast::Sender<OperationEvent>,
    config: &RuntimeConfig,
) -> Result<Operation, RuntimeError> {
    let mut draft = OperationDraft::from_fields(fields)?;

    let archiver_ref = Arc::clone(archiver);
    draft.filename = run_blocking(move || archiver_ref.archive(payload.as_slice())).await??;

    let store_ref = Arc::clone(store);
    let (draft, inserted) = run_blocking(move || {
        let id = store_ref.blocking_lock().insert(&draft);
        (draft, id)
    })
    .await?;

    let id = match inserted {
        Ok(id) => id,
        Err(err) => {
            if config.discard_orphaned_archives {
                discard_archive(archiver, events_tx, draft.filename).await;
            }
            return Err(err.into());
        }
    };

    info!(id, filename = %draft.filename, mission = %draft.mission_name, "operation inserted");
    let _ = events_tx.send(OperationEvent::Inserted { id });
    Ok(draft.into_record(id))
}

async fn discard_archive(
    archiver: &Arc<ReportArchiver>,
    events_tx: &broadcast::Sender<OperationEvent>,
    filename: String,
) {
    let archiver_ref = Arc::clone(archiver);
    let name = filename.clone();
    match run_blocking(move || archiver_ref.discard(&name)).await {
        Ok(Ok(())) => {
            warn!(%filename, "insert failed; archived report discarded");
            let _ = events_tx.send(OperationEvent::ArchiveDiscarded { filename });
        }
        Ok(Err(err)) => warn!(%filename, error = %err, "insert failed; archived report left orphaned"),
        Err(err) => warn!(%filename, error = %err, "insert failed; archived report left orphaned"),
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, RuntimeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::Worker(format!("join error: {e}")))
}
