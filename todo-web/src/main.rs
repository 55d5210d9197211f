//! `todo-web` -- browser to-do list server.
//!
//! Serves a single page listing to-do items and a form endpoint that appends
//! to it. Items are kept in memory by default or in PostgreSQL.
//!
//! # Usage
//!
//! ```bash
//! # In-memory list on 0.0.0.0:8080
//! cargo run --bin todo-web
//!
//! # PostgreSQL-backed list
//! DB_HOST=localhost DB_PORT=5432 DB_USER=todo DB_PASSWORD=secret DB_NAME=todo \
//!     cargo run --bin todo-web -- --backend postgres
//!
//! # Custom address and template
//! cargo run --bin todo-web -- --bind 127.0.0.1:3000 --template ./index.html
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use todo_web::config::{CliArgs, ServerConfig, StoreBackend};
use todo_web::error::StartupError;
use todo_web::postgres::PostgresStore;
use todo_web::server::{self, AppState};
use todo_web::store::{MemoryStore, TodoStore};
use todo_web::template::PageTemplate;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "startup failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Prepare the template and backend, then serve until Ctrl-C.
async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let template = match &config.template_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading page template");
            PageTemplate::load(path)?
        }
        None => PageTemplate::builtin()?,
    };

    match &config.backend {
        StoreBackend::Memory => serve(&config.bind_addr, MemoryStore::new(), template).await,
        StoreBackend::Postgres(settings) => {
            let store = PostgresStore::connect(settings).await?;
            store.ensure_schema().await?;
            tracing::info!(host = %settings.host, database = %settings.name, "postgres ready");
            serve(&config.bind_addr, store, template).await
        }
    }
}

/// Bind, log the address, and wait for the server to shut down.
async fn serve<S: TodoStore + 'static>(
    bind_addr: &str,
    store: S,
    template: PageTemplate,
) -> Result<(), StartupError> {
    let backend = store.backend_name();
    let state = Arc::new(AppState::new(store, template));

    let (addr, handle) = server::start_server_with_shutdown(bind_addr, state, shutdown_signal())
        .await
        .map_err(|source| StartupError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;

    tracing::info!(addr = %addr, backend, "server started");

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "server task failed");
    }
    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize logging to stdout, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for file logging that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let log_dir = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let Some(file_name) = log_path.file_name() else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        tracing::warn!(path = %log_path.display(), "log file path has no file name, logging to stdout");
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
