use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    serve, Router,
};
use chipline_utils::ingest::{FilterEngine, Pipeline};
use chipline_utils::{init_logging, AppConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod error;
mod handlers;
mod metrics;
mod middleware;
mod routes;

use handlers::health_check;
use middleware::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({e}), using defaults");
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting Chipline Dashboard API");

    let pipeline = Pipeline::from_config(&config).context("building ingestion pipeline")?;
    info!(directory = %pipeline.directory().display(), "source directory configured");

    let app = create_app(AppState::new(config.clone(), pipeline));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing server address")?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Dashboard API listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", routes::create_api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn(permissions_middleware)),
        )
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<Pipeline>,
    pub engine: Arc<FilterEngine>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            engine: Arc::new(FilterEngine::default()),
        }
    }
}

async fn metrics_handler() -> String {
    metrics::render()
}
