use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::resolver::CompetitionResolver;
use crate::store::{CompetitionStore, PreviewStore};
use crate::AppConfig;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{
    delete_competition, list_competitions, list_scraped_competitions, save_competition,
    search_competition,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CompetitionResolver>,
    pub competitions: Arc<dyn CompetitionStore>,
    pub previews: Arc<dyn PreviewStore>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    // Live scrapes can legitimately take a minute; the request bound has to
    // cover the slowest full pipeline, not a typical DB read.
    let request_timeout = Duration::from_secs(state.config.server.request_timeout);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api/competitions", competition_routes(state.clone()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn competition_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_competitions).post(save_competition))
        .route("/scraped", get(list_scraped_competitions))
        .route("/search", post(search_competition))
        .route("/:id", delete(delete_competition))
        .route_layer(from_fn_with_state(state, middleware::require_auth))
}

// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "etimad-scout"
    }))
}

pub async fn serve(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port)).await?;

    tracing::info!(
        "Server starting on {}:{}",
        config.server.host,
        config.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down...");
}
