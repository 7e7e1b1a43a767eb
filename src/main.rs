//! Sentinel Server
//!
//! Main entry point for the surveillance backend.

use sentinel_server::{state::AppConfig, web_api, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sentinel Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        infer_url = %config.infer_url,
        video_dir = %config.video_dir.display(),
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    // Upload target must exist before the first multipart write
    tokio::fs::create_dir_all(&config.video_dir).await?;

    // Create application state
    let state = AppState::new(config);

    // Probe the inference sidecar (non-fatal: workers surface outages themselves)
    match state.inference.health_check().await {
        Ok(true) => tracing::info!("Inference service reachable"),
        Ok(false) => tracing::warn!("Inference service responded unhealthy"),
        Err(e) => tracing::warn!(error = %e, "Inference service unreachable at startup"),
    }

    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
