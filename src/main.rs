use clap::Parser;
use photonest_api::{ApiContext, RestApi};
use photonest_core::FaceDetector;
use photonest_storage::{
    FaceScanner, IdentityGraph, LibraryStore, MediaIndexer, RemoteDetector, ThumbnailCache,
    UnconfiguredDetector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// A personal photo library service with face identity resolution
#[derive(Parser, Debug)]
#[command(name = "photonest")]
#[command(about = "A personal photo library with face identity resolution", long_about = None)]
struct Args {
    /// Path to the photo library root
    #[arg(short, long, default_value = "./photos")]
    library_root: PathBuf,

    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// HTTP API port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// URL of the remote face detection accelerator
    #[arg(long)]
    detector_url: Option<String>,

    /// Comma-separated list of indexable file extensions
    #[arg(long, default_value = "jpg,jpeg,png,gif,webp,bmp")]
    extensions: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting photonest v{}", env!("CARGO_PKG_VERSION"));
    info!("Library root: {:?}", args.library_root);
    info!("Data directory: {:?}", args.data_dir);
    info!("HTTP API port: {}", args.http_port);

    let store = Arc::new(LibraryStore::open(&args.data_dir)?);
    info!("Storage initialized");

    let detector: Arc<dyn FaceDetector> = match &args.detector_url {
        Some(url) => {
            info!("Face detector: {}", url);
            Arc::new(RemoteDetector::new(url)?)
        }
        None => {
            warn!("No face detector configured; scans will be refused");
            Arc::new(UnconfiguredDetector)
        }
    };

    let extensions: Vec<String> = args
        .extensions
        .split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let ctx = ApiContext {
        identity: Arc::new(IdentityGraph::new(store.clone())),
        scanner: Arc::new(FaceScanner::new(
            store.clone(),
            detector,
            args.library_root.clone(),
        )),
        indexer: Arc::new(MediaIndexer::new(
            store.clone(),
            args.library_root.clone(),
            extensions,
        )),
        thumbnails: Arc::new(ThumbnailCache::new(args.library_root.clone())),
        image_root: args.library_root.clone(),
        store,
    };

    let http_port = args.http_port;
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(ctx, http_port).await {
                eprintln!("HTTP server error: {}", e);
            }
        })
    });

    info!("photonest started successfully");
    info!("HTTP API: http://localhost:{}/", args.http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
