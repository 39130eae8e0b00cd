use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_ingest_backend::api::middleware::authorize::AllowAll;
use video_ingest_backend::config::UploadConfig;
use video_ingest_backend::infrastructure::{database, storage};
use video_ingest_backend::services::blob_store::BlobStore;
use video_ingest_backend::services::storage::ChunkStorage;
use video_ingest_backend::services::sweeper::Sweeper;
use video_ingest_backend::services::tracker::{FragmentTracker, InMemoryTracker};
use video_ingest_backend::services::upload_service::UploadService;
use video_ingest_backend::{AppState, create_app};

#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable chunked video ingest service")]
struct Args {
    /// Service type to run (api, sweeper, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_ingest_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting video ingest backend [Mode: {}]...", args.mode);

    let db = database::setup_database().await?;
    let chunk_storage: Arc<dyn ChunkStorage> = storage::setup_storage().await?;

    let upload_config = UploadConfig::from_env();
    info!(
        "📦 Upload config: max chunk {}MB, sweep every {}s, hard ttl {}h",
        upload_config.max_chunk_bytes / 1024 / 1024,
        upload_config.sweep_interval_secs,
        upload_config.hard_ttl_secs / 3600
    );

    let blob_store = Arc::new(BlobStore::new(db.clone(), chunk_storage.clone()));
    let tracker: Arc<dyn FragmentTracker> = Arc::new(InMemoryTracker::new());
    let uploads = Arc::new(UploadService::new(
        blob_store.clone(),
        tracker.clone(),
        upload_config.clone(),
    ));

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if args.mode == "sweeper" || args.mode == "all" {
        let sweeper = Sweeper::new(
            blob_store.clone(),
            tracker.clone(),
            upload_config.clone(),
            shutdown_rx.clone(),
        );
        tokio::spawn(async move {
            sweeper.run().await;
        });
    }

    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            db: db.clone(),
            storage: chunk_storage.clone(),
            tracker: tracker.clone(),
            uploads,
            authorizer: Arc::new(AllowAll),
            config: upload_config.clone(),
        };

        let app = create_app(state).layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            })
            .await?;

        info!("🛑 Server shut down gracefully.");
    } else {
        // Sweeper-only process: nothing to serve, just wait for a signal
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        info!("🛑 Sweeper shut down gracefully.");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
