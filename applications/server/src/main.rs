/// Shelfcast - audiobook directories served as one podcast feed
use anyhow::Context;
use clap::Parser;
use shelfcast_core::{job_queue, LibraryIndex, TranscodeStore};
use shelfcast_library::{spawn_watchers, CoverResolver, Scanner};
use shelfcast_media::{AudioEngine, FfmpegEngine, ProbeCache};
use shelfcast_server::{
    api::create_router, jobs, middleware::load_or_create_api_key, AppState, ServerConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shelfcast-server")]
#[command(about = "Serve a filesystem shelf of audiobooks as a podcast feed", long_about = None)]
struct Cli {
    /// Library root directories (layout: <root>/<author>/<title>/...)
    roots: Vec<PathBuf>,

    /// Override DATA_DIR from the environment
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override PORT from the environment
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfcast=info,shelfcast_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    tracing::info!("Starting Shelfcast");
    tracing::info!("Data dir: {}", config.data_dir.display());
    tracing::info!("Port: {}", config.port);
    if cli.roots.is_empty() {
        tracing::warn!("no library roots configured; the feed will answer with an error");
    }
    for root in &cli.roots {
        tracing::info!("Library root: {}", root.display());
    }

    let api_key = load_or_create_api_key(&config.data_dir).context("preparing api key")?;

    // One engine instance is shared by the scanner (probing, cover
    // extraction) and the worker (conversion).
    let engine: Arc<dyn AudioEngine> = Arc::new(FfmpegEngine::from_path());

    let index = Arc::new(RwLock::new(LibraryIndex::load(&config.data_dir)));
    let transcodes = Arc::new(Mutex::new(TranscodeStore::load(&config.data_dir)));
    let probes = Arc::new(Mutex::new(ProbeCache::load(
        &config.data_dir,
        Arc::clone(&engine),
    )));
    let (jobs_tx, jobs_rx) = job_queue();

    let state = AppState {
        config: Arc::new(config.clone()),
        roots: Arc::new(cli.roots.clone()),
        index: Arc::clone(&index),
        transcodes: Arc::clone(&transcodes),
        probes: Arc::clone(&probes),
        jobs: jobs_tx.clone(),
        api_key,
    };

    // Single transcode worker, running for the life of the process.
    tokio::spawn(jobs::run_worker(
        state.clone(),
        Arc::clone(&engine),
        jobs_rx,
    ));

    let covers = CoverResolver::new(config.data_dir.clone(), Arc::clone(&engine));
    let scanner = Arc::new(Scanner::new(
        cli.roots.clone(),
        config.data_dir.clone(),
        index,
        transcodes,
        probes,
        jobs_tx,
        covers,
    ));

    // Initial scan runs concurrently with the server; the feed may answer
    // with partial results until it finishes.
    let initial = Arc::clone(&scanner);
    tokio::spawn(async move {
        initial.scan().await;
    });

    let _watcher = spawn_watchers(&cli.roots, Arc::clone(&scanner));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
