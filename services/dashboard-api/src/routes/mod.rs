use axum::{routing::get, Router};

use crate::{handlers::*, AppState};

pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health/detailed", get(detailed_health_check))
        .nest("/production", production_routes())
}

fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_production))
        .route("/full", get(get_full_view))
        .route("/lots/:lot", get(get_lot_trace))
        .route("/extraction-log", get(get_extraction_log))
        .route("/stage-totals", get(get_stage_totals))
        .route("/export", get(export_production))
}
