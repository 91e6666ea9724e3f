//! Filtering, projection and aggregation over the canonical table.
//!
//! The engine only selects and reads rows; it never mutates the table. Every
//! projected or aggregated row gets a 1-based `sequence_no` at this point and
//! nowhere earlier.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use chipline_models::{CanonicalField, CanonicalRecord, CanonicalTable, Stage, Supplier, Value};

/// Selector values that mean "no constraint".
const ALL_TOKENS: [&str; 2] = ["all", "全部"];

fn is_all(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || ALL_TOKENS.iter().any(|token| raw.eq_ignore_ascii_case(token))
}

/// Parses a single-choice selector. Absent, empty or `all` is `None`.
pub fn parse_choice<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, T::Err> {
    match raw {
        Some(raw) if !is_all(raw) => raw.trim().parse().map(Some),
        _ => Ok(None),
    }
}

/// Parses a comma separated multi-select. Any `all` entry clears the list.
pub fn parse_multi(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    if values.iter().any(|value| is_all(value)) {
        return Vec::new();
    }
    values
}

/// Conjunction of optional constraints. Empty lists constrain nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub supplier: Option<Supplier>,
    pub stage: Option<Stage>,
    #[serde(default)]
    pub lots: Vec<String>,
    /// Matches either `device_name` or `wafer_model`.
    #[serde(default)]
    pub devices: Vec<String>,
    /// Only honoured for assembly work in process.
    #[serde(default)]
    pub current_stages: Vec<String>,
}

impl FilterSpec {
    pub fn is_assembly_wip(&self) -> bool {
        self.supplier == Some(Supplier::AssemblySubcontractor) && self.stage == Some(Stage::AsyInProcess)
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if self.supplier.is_some_and(|s| s != record.supplier) {
            return false;
        }
        if self.stage.is_some_and(|s| s != record.stage) {
            return false;
        }
        if !self.lots.is_empty() {
            let Some(lot) = &record.lot_no else {
                return false;
            };
            if !self.lots.contains(lot) {
                return false;
            }
        }
        if !self.devices.is_empty() && !record.device_keys().any(|key| self.devices.iter().any(|d| d == key)) {
            return false;
        }
        if self.is_assembly_wip() && !self.current_stages.is_empty() {
            let Some(current) = &record.current_stage else {
                return false;
            };
            if !self.current_stages.contains(current) {
                return false;
            }
        }
        true
    }
}

/// Fixed (supplier, stage) → ordered target-column lookup.
#[derive(Debug, Clone)]
pub struct TargetColumns {
    views: BTreeMap<(Supplier, Stage), Vec<CanonicalField>>,
}

impl TargetColumns {
    pub fn new() -> Self {
        let mut views = BTreeMap::new();
        for supplier in Supplier::ALL {
            for stage in supplier.stages() {
                let columns: Vec<CanonicalField> = stage
                    .fields()
                    .iter()
                    .copied()
                    .filter(|field| {
                        *field != CanonicalField::StatusCode || supplier == Supplier::FinalTestSubcontractorB
                    })
                    .collect();
                views.insert((supplier, *stage), columns);
            }
        }
        Self { views }
    }

    fn stage_view(&self, supplier: Supplier, stage: Stage) -> Vec<CanonicalField> {
        let owner = if supplier.reports(stage) {
            supplier
        } else {
            stage.primary_supplier()
        };
        self.views.get(&(owner, stage)).cloned().unwrap_or_default()
    }

    /// Union of a supplier's stage views, in order of first appearance.
    fn combined_view(&self, supplier: Supplier) -> Vec<CanonicalField> {
        let mut columns: Vec<CanonicalField> = Vec::new();
        for stage in supplier.stages() {
            for field in self.stage_view(supplier, *stage) {
                if !columns.contains(&field) {
                    columns.push(field);
                }
            }
        }
        columns
    }

    pub fn lookup(&self, supplier: Option<Supplier>, stage: Option<Stage>) -> Vec<CanonicalField> {
        match (supplier, stage) {
            (Some(supplier), Some(stage)) => self.stage_view(supplier, stage),
            (Some(supplier), None) => self.combined_view(supplier),
            (None, Some(stage)) => self.stage_view(stage.primary_supplier(), stage),
            (None, None) => CanonicalField::ALL.to_vec(),
        }
    }
}

impl Default for TargetColumns {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRow {
    pub sequence_no: usize,
    pub values: Vec<Value>,
}

/// Rows projected onto an ordered column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedView {
    pub columns: Vec<CanonicalField>,
    pub rows: Vec<ProjectedRow>,
}

impl ProjectedView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom. Empty when the column is not projected.
    pub fn column(&self, field: CanonicalField) -> Vec<&Value> {
        let Some(idx) = self.columns.iter().position(|c| *c == field) else {
            return Vec::new();
        };
        self.rows.iter().filter_map(|row| row.values.get(idx)).collect()
    }
}

/// Total quantity sitting at one assembly stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLoad {
    pub sequence_no: usize,
    pub current_stage: String,
    pub total_qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredView {
    pub view: ProjectedView,
    /// Present only for assembly work in process.
    pub stage_load: Option<Vec<StageLoad>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotTrace {
    pub lot_no: String,
    pub view: ProjectedView,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTotal {
    pub supplier: Supplier,
    pub stage: Stage,
    pub total_quantity: f64,
    pub rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    columns: TargetColumns,
}

impl FilterEngine {
    pub fn new(columns: TargetColumns) -> Self {
        Self { columns }
    }

    pub fn target_columns(&self, spec: &FilterSpec) -> Vec<CanonicalField> {
        self.columns.lookup(spec.supplier, spec.stage)
    }

    pub fn select<'a>(&self, table: &'a CanonicalTable, spec: &FilterSpec) -> Vec<&'a CanonicalRecord> {
        table.records.iter().filter(|record| spec.matches(record)).collect()
    }

    pub fn project(&self, rows: &[&CanonicalRecord], columns: &[CanonicalField]) -> ProjectedView {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(idx, record)| ProjectedRow {
                sequence_no: idx + 1,
                values: columns.iter().map(|field| record.get(*field)).collect(),
            })
            .collect();
        ProjectedView {
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Select, project onto the filter's target columns, and aggregate stage
    /// load when the filter addresses assembly work in process.
    pub fn apply(&self, table: &CanonicalTable, spec: &FilterSpec) -> FilteredView {
        let rows = self.select(table, spec);
        let view = self.project(&rows, &self.target_columns(spec));
        let stage_load = spec.is_assembly_wip().then(|| self.stage_load(&rows));
        FilteredView { view, stage_load }
    }

    /// Sum of `current_stage_qty` per current stage, largest first, ties by name.
    /// Null quantities are skipped.
    pub fn stage_load(&self, rows: &[&CanonicalRecord]) -> Vec<StageLoad> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for record in rows {
            let Some(stage) = record.current_stage.as_deref() else {
                continue;
            };
            let total = totals.entry(stage).or_insert(0.0);
            if let Some(qty) = record.current_stage_qty {
                *total += qty;
            }
        }

        let mut loads: Vec<(&str, f64)> = totals.into_iter().collect();
        loads.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        loads
            .into_iter()
            .enumerate()
            .map(|(idx, (stage, total_qty))| StageLoad {
                sequence_no: idx + 1,
                current_stage: stage.to_string(),
                total_qty,
            })
            .collect()
    }

    pub fn lot_options(&self, table: &CanonicalTable) -> Vec<String> {
        distinct(table.records.iter().filter_map(|r| r.lot_no.as_deref()))
    }

    pub fn current_stage_options(&self, table: &CanonicalTable) -> Vec<String> {
        distinct(
            table
                .for_supplier(Supplier::AssemblySubcontractor)
                .filter_map(|r| r.current_stage.as_deref()),
        )
    }

    pub fn device_options(&self, table: &CanonicalTable) -> Vec<String> {
        distinct(table.records.iter().flat_map(CanonicalRecord::device_keys))
    }

    /// Whole table, projected onto the supplier's combined view.
    pub fn full_view(&self, table: &CanonicalTable, supplier: Option<Supplier>) -> ProjectedView {
        let spec = FilterSpec {
            supplier,
            ..FilterSpec::default()
        };
        let rows = self.select(table, &spec);
        self.project(&rows, &self.target_columns(&spec))
    }

    /// Every row of one lot across suppliers, with a status line per row.
    pub fn lot_trace(&self, table: &CanonicalTable, lot_no: &str) -> LotTrace {
        let spec = FilterSpec {
            lots: vec![lot_no.to_string()],
            ..FilterSpec::default()
        };
        let rows = self.select(table, &spec);
        let summary = rows.iter().map(|record| status_line(record)).collect();
        LotTrace {
            lot_no: lot_no.to_string(),
            view: self.project(&rows, &CanonicalField::ALL),
            summary,
        }
    }

    /// Quantity per (supplier, stage) in canonical order. Placeholder rows are
    /// not counted.
    pub fn stage_totals(&self, table: &CanonicalTable) -> Vec<StageTotal> {
        let mut totals: BTreeMap<(Supplier, Stage), (f64, usize)> = BTreeMap::new();
        for record in table.records.iter().filter(|r| !r.is_placeholder()) {
            let entry = totals.entry((record.supplier, record.stage)).or_insert((0.0, 0));
            entry.0 += record.quantity.unwrap_or(0.0);
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|((supplier, stage), (total_quantity, rows))| StageTotal {
                supplier,
                stage,
                total_quantity,
                rows,
            })
            .collect()
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn status_line(record: &CanonicalRecord) -> String {
    let mut line = format!("{} | {}", record.supplier, record.stage);
    if record.supplier == Supplier::AssemblySubcontractor && record.stage == Stage::AsyInProcess {
        line.push_str(&format!(
            " | current stage: {} | qty: {}",
            record.current_stage.as_deref().unwrap_or_default(),
            Value::from(record.current_stage_qty)
        ));
    }
    line
}
