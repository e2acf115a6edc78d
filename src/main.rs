use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use missionlog::{
    archive::ReportArchiver,
    config::Options,
    persist::sqlite::SqliteOperationStore,
    runtime::handle::{RuntimeConfig, spawn_oplog},
    web::{self, AppState},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "missionlog", about = "Mission report archive and listing service")]
struct Args {
    /// Options file (site metadata, mission classes, server section).
    #[arg(long, default_value = "option.json")]
    config: PathBuf,
    /// Overrides `server.listen` from the options file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("missionlog=info")),
        )
        .init();

    let args = Args::parse();
    let options = Options::load(&args.config)?;
    let server = options.server.clone();

    let homepage = web::render_homepage(&server.template_dir, &options)?;
    let store = SqliteOperationStore::open(&server.database)
        .with_context(|| format!("opening database {}", server.database.display()))?;
    let archiver = ReportArchiver::new(&server.archive_dir)
        .with_context(|| format!("preparing archive dir {}", server.archive_dir.display()))?;

    let handle = spawn_oplog(Box::new(store), archiver, RuntimeConfig::default());
    let state = AppState {
        handle: handle.clone(),
        homepage: homepage.into(),
        static_dir: server.static_dir.clone(),
        allow_uploads: server.allow_uploads,
        max_upload_bytes: server.max_upload_bytes,
    };

    let listen = args.listen.unwrap_or(server.listen);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    info!(%listen, title = %options.title, uploads = server.allow_uploads, "missionlog listening");

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handle.shutdown().await?;
    info!("missionlog stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "ctrl-c handler unavailable");
    }
}
