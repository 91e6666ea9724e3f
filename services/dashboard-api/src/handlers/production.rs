//! Production board handlers
//!
//! Every request runs a fresh refresh of the source directory on the blocking
//! pool and answers from that snapshot.

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chipline_models::{CanonicalField, ExtractionEntry, Stage, Supplier};
use chipline_utils::ingest::{
    parse_choice, parse_multi, FilterSpec, LotTrace, ProjectedView, Refresh, StageAnomaly, StageLoad, StageTotal,
};
use chipline_utils::ChiplineError;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::metrics;
use crate::middleware::Permissions;
use crate::AppState;

async fn refresh(state: &AppState) -> Result<Refresh, ApiError> {
    let pipeline = state.pipeline.clone();
    let started = Instant::now();
    let refresh = tokio::task::spawn_blocking(move || pipeline.refresh())
        .await
        .map_err(|e| ChiplineError::internal(format!("refresh task failed: {e}")))??;
    metrics::record_refresh(&refresh.log, started.elapsed());
    Ok(refresh)
}

// ===== Filtered view =====

#[derive(Debug, Default, Deserialize)]
pub struct ProductionQuery {
    pub supplier: Option<String>,
    pub stage: Option<String>,
    /// Comma separated.
    pub lot: Option<String>,
    /// Comma separated.
    pub device: Option<String>,
    /// Comma separated.
    pub current_stage: Option<String>,
}

impl ProductionQuery {
    pub fn to_spec(&self) -> Result<FilterSpec, ChiplineError> {
        let supplier = parse_choice::<Supplier>(self.supplier.as_deref())
            .map_err(|e| ChiplineError::validation("supplier", e.to_string()))?;
        let stage = parse_choice::<Stage>(self.stage.as_deref())
            .map_err(|e| ChiplineError::validation("stage", e.to_string()))?;
        Ok(FilterSpec {
            supplier,
            stage,
            lots: parse_multi(self.lot.as_deref()),
            devices: parse_multi(self.device.as_deref()),
            current_stages: parse_multi(self.current_stage.as_deref()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub suppliers: Vec<Supplier>,
    /// Stages of the selected supplier, or all stages.
    pub stages: Vec<Stage>,
    pub lots: Vec<String>,
    pub devices: Vec<String>,
    pub current_stages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractionSummary {
    pub headline: &'static str,
    pub entries: Vec<ExtractionEntry>,
    pub anomalies: Vec<StageAnomaly>,
}

impl From<&Refresh> for ExtractionSummary {
    fn from(refresh: &Refresh) -> Self {
        Self {
            headline: refresh.log.headline(),
            entries: refresh.log.entries().to_vec(),
            anomalies: refresh.anomalies.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductionResponse {
    pub filters: FilterSpec,
    pub view: ProjectedView,
    pub stage_load: Option<Vec<StageLoad>>,
    pub options: FilterOptions,
    pub extraction: ExtractionSummary,
    pub refreshed_at: String,
}

/// GET /api/v1/production
pub async fn get_production(
    State(state): State<AppState>,
    Query(query): Query<ProductionQuery>,
) -> Result<Json<ProductionResponse>, ApiError> {
    let spec = query.to_spec()?;
    let refresh = refresh(&state).await?;
    let engine = &state.engine;

    let filtered = engine.apply(&refresh.table, &spec);
    let stages = match spec.supplier {
        Some(supplier) => supplier.stages().to_vec(),
        None => Stage::ALL.to_vec(),
    };
    let options = FilterOptions {
        suppliers: Supplier::ALL.to_vec(),
        stages,
        lots: engine.lot_options(&refresh.table),
        devices: engine.device_options(&refresh.table),
        current_stages: engine.current_stage_options(&refresh.table),
    };

    Ok(Json(ProductionResponse {
        extraction: ExtractionSummary::from(&refresh),
        filters: spec,
        view: filtered.view,
        stage_load: filtered.stage_load,
        options,
        refreshed_at: Utc::now().to_rfc3339(),
    }))
}

// ===== Full table and lot trace =====

#[derive(Debug, Default, Deserialize)]
pub struct FullViewQuery {
    pub supplier: Option<String>,
}

/// GET /api/v1/production/full
pub async fn get_full_view(
    State(state): State<AppState>,
    Query(query): Query<FullViewQuery>,
) -> Result<Json<ProjectedView>, ApiError> {
    let supplier = parse_choice::<Supplier>(query.supplier.as_deref())
        .map_err(|e| ChiplineError::validation("supplier", e.to_string()))?;
    let refresh = refresh(&state).await?;
    Ok(Json(state.engine.full_view(&refresh.table, supplier)))
}

/// GET /api/v1/production/lots/:lot
pub async fn get_lot_trace(
    State(state): State<AppState>,
    Path(lot): Path<String>,
) -> Result<Json<LotTrace>, ApiError> {
    let lot = lot.trim();
    if lot.is_empty() {
        return Err(ChiplineError::validation("lot", "lot number is empty").into());
    }
    let refresh = refresh(&state).await?;
    Ok(Json(state.engine.lot_trace(&refresh.table, lot)))
}

// ===== Extraction log and chart feed =====

/// GET /api/v1/production/extraction-log
pub async fn get_extraction_log(State(state): State<AppState>) -> Result<Json<ExtractionSummary>, ApiError> {
    let refresh = refresh(&state).await?;
    Ok(Json(ExtractionSummary::from(&refresh)))
}

/// GET /api/v1/production/stage-totals
pub async fn get_stage_totals(State(state): State<AppState>) -> Result<Json<Vec<StageTotal>>, ApiError> {
    let refresh = refresh(&state).await?;
    Ok(Json(state.engine.stage_totals(&refresh.table)))
}

// ===== Export =====

/// CSV of a projected view with a leading `sequence_no` column.
pub fn to_csv(view: &ProjectedView) -> Result<Vec<u8>, ChiplineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let header = std::iter::once("sequence_no").chain(view.columns.iter().map(CanonicalField::name));
    writer
        .write_record(header)
        .map_err(|e| ChiplineError::internal(format!("csv export: {e}")))?;
    for row in &view.rows {
        let record = std::iter::once(row.sequence_no.to_string()).chain(row.values.iter().map(ToString::to_string));
        writer
            .write_record(record)
            .map_err(|e| ChiplineError::internal(format!("csv export: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| ChiplineError::internal(format!("csv export: {e}")))
}

/// GET /api/v1/production/export
pub async fn export_production(
    State(state): State<AppState>,
    Extension(permissions): Extension<Permissions>,
    Query(query): Query<ProductionQuery>,
) -> Result<Response, ApiError> {
    if !permissions.export {
        return Err(ApiError::forbidden("export permission required"));
    }
    let spec = query.to_spec()?;
    let refresh = refresh(&state).await?;
    let view = state.engine.apply(&refresh.table, &spec).view;
    let body = to_csv(&view)?;

    let file_name = format!("production_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
    let disposition = format!("attachment; filename=\"{file_name}\"");
    tracing::info!(rows = view.len(), file = %file_name, "production export");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, disposition.as_str()),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipline_models::Value;
    use chipline_utils::ingest::ProjectedRow;

    #[test]
    fn test_query_parsing() {
        let query = ProductionQuery {
            supplier: Some("AssemblySubcontractor".into()),
            stage: Some("全部".into()),
            lot: Some("L1,L2".into()),
            device: None,
            current_stage: Some("all".into()),
        };
        let spec = query.to_spec().unwrap();
        assert_eq!(spec.supplier, Some(Supplier::AssemblySubcontractor));
        assert_eq!(spec.stage, None);
        assert_eq!(spec.lots, vec!["L1", "L2"]);
        assert!(spec.current_stages.is_empty());

        let bad = ProductionQuery {
            stage: Some("FT_done".into()),
            ..ProductionQuery::default()
        };
        assert_eq!(bad.to_spec().unwrap_err().error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_csv_has_sequence_column() {
        let view = ProjectedView {
            columns: vec![CanonicalField::LotNo, CanonicalField::Quantity],
            rows: vec![
                ProjectedRow {
                    sequence_no: 1,
                    values: vec![Value::Text("L1".into()), Value::Number(25.0)],
                },
                ProjectedRow {
                    sequence_no: 2,
                    values: vec![Value::Text("L,2".into()), Value::Null],
                },
            ],
        };
        let csv = String::from_utf8(to_csv(&view).unwrap()).unwrap();
        assert_eq!(csv, "sequence_no,lot_no,quantity\n1,L1,25\n2,\"L,2\",\n");
    }
}
