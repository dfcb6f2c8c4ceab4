//! Gifted server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use gifted_api::{AppState, router as api_router};
use gifted_common::Config;
use gifted_core::{LocalStorage, sms};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Headroom for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gifted=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting gifted server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = gifted_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    gifted_db::migrate(&db).await?;
    info!("Migrations completed");

    // Media storage, served back under the configured prefix
    let media_prefix = format!("/{}", config.media.url_prefix.trim_matches('/'));
    if media_prefix == "/" {
        return Err("media.url_prefix must not be empty".into());
    }
    let media_dir = PathBuf::from(&config.media.storage_dir);
    let storage = LocalStorage::new(
        media_dir.clone(),
        format!("{}{media_prefix}", config.server.url.trim_end_matches('/')),
    );

    let sms = sms::from_config(config.sms.as_ref());

    let state = AppState::new(Arc::new(db), &config, Arc::new(storage), sms);

    let app = Router::new()
        .merge(api_router())
        .nest_service(&media_prefix, ServeDir::new(media_dir))
        .layer(DefaultBodyLimit::max(
            config.media.max_upload_bytes + MULTIPART_OVERHEAD,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gifted_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
