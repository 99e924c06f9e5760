//! Caseflow API Server
//!
//! Usage:
//!   caseflow-api                      # configuration from the environment / .env
//!   caseflow-api --config app.toml    # TOML file, environment overrides
//!   caseflow-api --in-memory          # no SurrealDB, nothing persisted

use anyhow::Context;
use caseflow_api::{create_router, state::AppState};
use caseflow_core::{AppConfig, LoggingConfig};
use caseflow_store::{spawn_prune_job, DocumentStore, MemoryStore, RevocationStore, UserStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caseflow-api")]
#[command(about = "Caseflow legal case marketplace API server")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the in-memory store instead of SurrealDB
    #[arg(long)]
    in_memory: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{},caseflow_api=debug,caseflow_store=info,tower_http=info",
            logging.level
        )
        .into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path.clone())?,
        None => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);

    // Open the document store
    let (users, revocations): (Arc<dyn UserStore>, Arc<dyn RevocationStore>) = if args.in_memory {
        tracing::warn!("Using in-memory store; accounts and revocations are not persisted");
        let store = Arc::new(MemoryStore::new());
        (
            store.clone() as Arc<dyn UserStore>,
            store as Arc<dyn RevocationStore>,
        )
    } else {
        let store = Arc::new(
            DocumentStore::connect(&config.database)
                .await
                .context("Failed to connect to SurrealDB")?,
        );
        (
            store.clone() as Arc<dyn UserStore>,
            store as Arc<dyn RevocationStore>,
        )
    };

    let prune_every = Duration::from_secs(config.database.prune_interval_secs.max(1));
    let prune_job = spawn_prune_job(revocations.clone(), prune_every);

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config, users, revocations));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Caseflow API Server starting on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    prune_job.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
