use axum::{extract::State, response::Json};
use chipline_utils::ingest::pipeline::list_directory;
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chipline-dashboard-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Reports whether the supplier drop directory can be listed.
pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let directory = state.config.source.directory.clone();
    let listing = tokio::task::spawn_blocking(move || list_directory(&directory)).await;

    let source = match listing {
        Ok(Ok(files)) => json!({"status": "healthy", "message": format!("{} files", files.len())}),
        Ok(Err(e)) => json!({"status": "unhealthy", "message": e.to_string()}),
        Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
    };
    let status = if source["status"] == "healthy" { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "chipline-dashboard-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "source_directory": source
        }
    }))
}
