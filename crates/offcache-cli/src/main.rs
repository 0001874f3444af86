//! offcache - command-line host for the offline resource cache.
//!
//! Drives the engine against an on-disk store registry and the real network:
//! install a version's assets, prune old versions, and answer requests the
//! way the application would see them offline.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offcache_core::{
    Engine, EngineConfig, Event, EventOutcome, FetchOutcome, FsRegistry, HttpTransport,
    ResourceRequest, StoreRegistry, StoredResponse, Url, VersionStore, Worker,
};
use tokio::sync::oneshot;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type CliWorker = Worker<FsRegistry, HttpTransport>;

#[derive(Parser)]
#[command(name = "offcache", version, about = "Versioned offline cache for a web application")]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true, env = "OFFCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory of the store registry
    #[arg(long, global = true, env = "OFFCACHE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Populate the current version's store from the manifest
    Install {
        /// Activate (prune stale stores) once install succeeds
        #[arg(long)]
        activate: bool,
    },
    /// Delete every store superseded by the current version
    Prune,
    /// Resolve a request through the fetch policy and print the response body
    Fetch {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Print status and headers to stderr
        #[arg(long)]
        verbose: bool,
    },
    /// Print the number of entries in the current store
    Size,
    /// List stores in the registry
    Stores,
    /// Deliver a control message (JSON) and print any reply
    Message { json: String },
    /// Deliver a background-sync tag
    Sync { tag: String },
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path.file_name().context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                file_name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => path,
        None => EngineConfig::default_path()?,
    };
    EngineConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn build_worker(config: EngineConfig, cache_dir: Option<PathBuf>) -> Result<CliWorker> {
    let cache_dir = match cache_dir {
        Some(dir) => dir,
        None => EngineConfig::default_cache_dir()?,
    };
    let transport = HttpTransport::new().context("Failed to create HTTP client")?;
    Ok(Worker::new(Engine::new(
        config,
        FsRegistry::new(cache_dir),
        transport,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_ref())?;

    let config = load_config(cli.config)?;
    let worker = build_worker(config, cli.cache_dir)?;
    info!(store = worker.engine().store_name(), "offcache starting");

    let result = match cli.command {
        Command::Install { activate } => install(&worker, activate).await,
        Command::Prune => prune(&worker).await,
        Command::Fetch {
            url,
            method,
            verbose,
        } => fetch(&worker, &url, &method, verbose).await,
        Command::Size => size(&worker).await,
        Command::Stores => stores(&worker).await,
        Command::Message { json } => message(&worker, &json).await,
        Command::Sync { tag } => {
            worker.dispatch(Event::Sync(tag)).await?;
            Ok(())
        }
    };

    // Let write-backs and optional installs land before exiting
    worker.engine().settle().await;
    result
}

async fn install(worker: &CliWorker, activate: bool) -> Result<()> {
    let report = worker.install().await?;
    eprintln!(
        "Installed {} mandatory asset(s) into {} ({} optional in background)",
        report.mandatory.len(),
        report.store,
        report.optional_scheduled
    );

    if activate {
        let activation = worker.activate().await?;
        for name in &activation.deleted {
            eprintln!("Deleted stale store {}", name);
        }
        eprintln!("Activated {}", activation.store);
    }
    Ok(())
}

async fn prune(worker: &CliWorker) -> Result<()> {
    let engine = worker.engine();
    let deleted = offcache_core::pruner::prune(engine.registry(), engine.config()).await?;
    if deleted.is_empty() {
        eprintln!("Nothing to prune");
    }
    for name in deleted {
        eprintln!("Deleted stale store {}", name);
    }
    Ok(())
}

async fn fetch(worker: &CliWorker, target: &str, method: &str, verbose: bool) -> Result<()> {
    let engine = worker.engine();
    let url = engine
        .config()
        .resolve(target)
        .or_else(|_| Url::parse(target))
        .with_context(|| format!("Invalid URL: {}", target))?;

    // The CLI host is always controlled by the configured version
    match engine.handle(&ResourceRequest::new(method, url)).await {
        FetchOutcome::Passthrough => {
            eprintln!("Not intercepted ({} requests pass through)", method);
        }
        FetchOutcome::Respond { response, source } => {
            if verbose {
                eprintln!("{} {} ({:?})", response.status, response.reason(), source);
                for (name, value) in &response.headers {
                    eprintln!("{}: {}", name, value);
                }
            }
            io::stdout().write_all(&response.body)?;
        }
    }
    Ok(())
}

async fn size(worker: &CliWorker) -> Result<()> {
    println!("{}", worker.cache_size().await?);
    Ok(())
}

async fn stores(worker: &CliWorker) -> Result<()> {
    let engine = worker.engine();
    let registry = engine.registry();

    for name in registry.list_names().await? {
        let store = registry.open(&name).await?;
        let keys = store.keys().await?;

        let mut newest: Option<StoredResponse> = None;
        for key in &keys {
            if let Some(entry) = store.get(key).await? {
                let is_newer = newest
                    .as_ref()
                    .map_or(true, |n| entry.stored_at > n.stored_at);
                if is_newer {
                    newest = Some(entry);
                }
            }
        }

        let marker = if name == engine.store_name() { "*" } else { " " };
        let age = newest
            .map(|entry| entry.age_display())
            .unwrap_or_else(|| "never".to_string());
        println!("{} {:<32} {:>6} entries  updated {}", marker, name, keys.len(), age);
    }
    Ok(())
}

async fn message(worker: &CliWorker, json: &str) -> Result<()> {
    let data: serde_json::Value = serde_json::from_str(json).context("Message must be JSON")?;
    let (tx, rx) = oneshot::channel();

    let outcome = worker
        .dispatch(Event::Message {
            data,
            reply: Some(tx),
        })
        .await?;
    debug_assert!(matches!(outcome, EventOutcome::MessageHandled));

    match rx.await {
        Ok(reply) => println!("{}", reply),
        Err(_) => eprintln!("No reply"),
    }
    Ok(())
}
