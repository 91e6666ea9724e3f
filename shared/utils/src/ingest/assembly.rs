//! AssemblySubcontractor exports.
//!
//! The WIP sheet opens with a metadata block; stage names sit in a fixed row of
//! that block, above a run of per-stage quantity columns. Each lot's current
//! stage is resolved from that run.

use chipline_models::{CanonicalField, CanonicalRecord, Stage, Supplier};

use super::extractor::{
    check_width, column_letter, extract_rows, is_blank, map_row, read_sheet, FileExtraction, StageAnomaly,
    SupplierExtractor,
};
use super::layout::AssemblyLayouts;
use super::resolver::CurrentStageResolver;
use super::workbook::{Cell, Sheet, Workbook};
use crate::error::ChiplineResult;

#[derive(Debug, Clone)]
pub struct AssemblyExtractor {
    layouts: AssemblyLayouts,
    resolver: CurrentStageResolver,
    backfill: bool,
}

impl AssemblyExtractor {
    pub fn new(layouts: AssemblyLayouts, resolver: CurrentStageResolver, backfill: bool) -> Self {
        Self {
            layouts,
            resolver,
            backfill,
        }
    }

    fn in_process(
        &self,
        file_name: &str,
        sheet: &Sheet,
        anomalies: &mut Vec<StageAnomaly>,
    ) -> ChiplineResult<Vec<CanonicalRecord>> {
        let block = &self.layouts.in_process;
        let map = &block.map;
        let needed = map.max_index().max(Some(block.last_stage_column));
        check_width(sheet, map.skip_rows, needed)?;

        let names: Vec<String> = block
            .stage_columns()
            .map(|col| {
                sheet
                    .cell(block.stage_name_row, col)
                    .to_text()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| column_letter(col))
            })
            .collect();

        let mut records = Vec::new();
        for (row, _) in sheet.data_rows(map.skip_rows) {
            let columns = map.columns.iter().map(|b| b.index).chain(block.stage_columns());
            if is_blank(sheet, row, columns) {
                continue;
            }

            let values: Vec<Cell> = block
                .stage_columns()
                .map(|col| sheet.cell(row, col).clone())
                .collect();
            let resolution = self.resolver.resolve(&names, &values);

            let mut record = map_row(Supplier::AssemblySubcontractor, Stage::AsyInProcess, map, sheet, row);
            if resolution.is_ambiguous() {
                tracing::warn!(
                    file = %file_name,
                    lot_no = ?record.lot_no,
                    stages = ?resolution.qualifying,
                    "lot has quantity in several stage columns"
                );
                anomalies.push(StageAnomaly {
                    file: file_name.to_string(),
                    lot_no: record.lot_no.clone(),
                    stages: resolution.qualifying.clone(),
                });
            }
            record.set_text(CanonicalField::CurrentStage, Some(resolution.stage));
            record.set_quantity(CanonicalField::CurrentStageQty, Some(resolution.quantity));
            records.push(record.normalized(self.backfill));
        }
        Ok(records)
    }
}

impl SupplierExtractor for AssemblyExtractor {
    fn supplier(&self) -> Supplier {
        Supplier::AssemblySubcontractor
    }

    fn extract(&self, file_name: &str, workbook: &mut dyn Workbook) -> FileExtraction {
        let mut out = FileExtraction::default();

        let mut anomalies = Vec::new();
        let wip = read_sheet(workbook, &self.layouts.in_process.map.sheet)
            .and_then(|sheet| self.in_process(file_name, &sheet, &mut anomalies));
        out.absorb(wip);

        let completed = &self.layouts.completed;
        let done = read_sheet(workbook, &completed.sheet).and_then(|sheet| {
            extract_rows(self.supplier(), Stage::AsyCompleted, completed, &sheet, self.backfill)
        });
        out.absorb(done);

        if !anomalies.is_empty() {
            out.notes.push(format!("{} lots with several stage quantities", anomalies.len()));
        }
        out.anomalies = anomalies;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::extractor::test_support::*;
    use crate::ingest::layout::Layouts;
    use crate::ingest::resolver::MultiStagePolicy;
    use crate::ingest::workbook::MemoryWorkbook;

    const STAGES: [&str; 10] = [
        "Die Attach", "Wire Bond", "Mold", "Plating", "Marking", "Trim", "Form", "Test", "Pack", "Ship",
    ];

    fn wip_sheet(stage_values: &[(usize, f64)]) -> Sheet {
        Sheet::new("ATX WIP", wip_rows(stage_values))
    }

    fn wip_rows(stage_values: &[(usize, f64)]) -> Vec<Vec<Cell>> {
        let mut rows: Vec<Vec<Cell>> = (0..5).map(|_| row(23, &[(0, text("meta"))])).collect();
        let mut names = row(23, &[]);
        for (offset, name) in STAGES.iter().enumerate() {
            names[13 + offset] = text(&format!(" {name} "));
        }
        rows.push(names);

        let mut lot = row(
            23,
            &[
                (1, text("DEV-A")),
                (4, text("LOT-9")),
                (7, text("PO-1")),
                (9, num(3000.0)),
                (12, Cell::DateTime(45352.25)),
            ],
        );
        for (offset, qty) in stage_values {
            lot[13 + offset] = num(*qty);
        }
        rows.push(lot);
        rows.push(row(23, &[]));
        rows
    }

    fn fg_sheet() -> Sheet {
        let mut rows: Vec<Vec<Cell>> = (0..6).map(|_| header(14)).collect();
        rows.push(row(
            14,
            &[(1, num(2500.0)), (2, text("LOT-8")), (8, text("DEV-A")), (13, text("2410"))],
        ));
        Sheet::new("ATX FG", rows)
    }

    fn extractor(policy: MultiStagePolicy) -> AssemblyExtractor {
        AssemblyExtractor::new(Layouts::default().assembly, CurrentStageResolver::new(policy), true)
    }

    #[test]
    fn test_current_stage_comes_from_the_first_non_zero_column() {
        let mut book = MemoryWorkbook::new()
            .with_sheet(wip_sheet(&[(0, 0.0), (2, 4.0), (5, 9.0)]))
            .with_sheet(fg_sheet());
        let out = extractor(MultiStagePolicy::FirstMatch).extract("ITS_0301.xlsx", &mut book);

        assert!(out.failures.is_empty());
        assert_eq!(out.records.len(), 2);
        let wip = &out.records[0];
        assert_eq!(wip.current_stage.as_deref(), Some("Mold"));
        assert_eq!(wip.current_stage_qty, Some(4.0));
        assert_eq!(wip.quantity, Some(4.0));
        assert_eq!(wip.start_time.as_deref(), Some("2024-03-01 06:00:00"));
        assert_eq!(wip.wafer_model.as_deref(), Some("DEV-A"));
        assert!(out.anomalies.is_empty());

        let fg = &out.records[1];
        assert_eq!(fg.stage, Stage::AsyCompleted);
        assert_eq!(fg.quantity, Some(2500.0));
        assert_eq!(fg.date_code.as_deref(), Some("2410"));
    }

    #[test]
    fn test_lot_with_no_stage_quantity_is_kept() {
        let mut book = MemoryWorkbook::new()
            .with_sheet(wip_sheet(&[]))
            .with_sheet(fg_sheet());
        let out = extractor(MultiStagePolicy::FirstMatch).extract("ITS_0301.xlsx", &mut book);
        let wip = &out.records[0];
        assert_eq!(wip.lot_no.as_deref(), Some("LOT-9"));
        assert_eq!(wip.current_stage.as_deref(), Some(""));
        assert_eq!(wip.current_stage_qty, Some(0.0));
    }

    #[test]
    fn test_flag_policy_records_anomaly() {
        let mut book = MemoryWorkbook::new()
            .with_sheet(wip_sheet(&[(2, 4.0), (5, 9.0)]))
            .with_sheet(fg_sheet());
        let out = extractor(MultiStagePolicy::FlagAnomaly).extract("ITS_0301.xlsx", &mut book);
        assert_eq!(out.records[0].current_stage.as_deref(), Some("Mold"));
        assert_eq!(out.anomalies.len(), 1);
        assert_eq!(out.anomalies[0].lot_no.as_deref(), Some("LOT-9"));
        assert_eq!(out.anomalies[0].stages, vec!["Mold".to_string(), "Trim".to_string()]);
        assert_eq!(out.notes.len(), 1);
    }

    #[test]
    fn test_missing_wip_sheet_keeps_completed_rows() {
        let mut book = MemoryWorkbook::new().with_sheet(fg_sheet());
        let out = extractor(MultiStagePolicy::FirstMatch).extract("ITS_0301.xlsx", &mut book);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.failures.len(), 1);
    }

    #[test]
    fn test_blank_stage_header_is_named_by_column() {
        let mut rows = wip_rows(&[(2, 4.0)]);
        rows[5][15] = Cell::Empty;
        let mut book = MemoryWorkbook::new()
            .with_sheet(Sheet::new("ATX WIP", rows))
            .with_sheet(fg_sheet());
        let out = extractor(MultiStagePolicy::FirstMatch).extract("ITS_0301.xlsx", &mut book);
        assert_eq!(out.records[0].current_stage.as_deref(), Some("P"));
        assert_eq!(out.records[0].current_stage_qty, Some(4.0));
    }
}
