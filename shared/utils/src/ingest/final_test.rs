//! Final-test subcontractor exports.
//!
//! Subcontractor A sends one file per stage and names the stage in the file
//! name. Subcontractor B sends a single sheet and tags each row with a status
//! code; its one quantity column is redistributed into the stage's named
//! quantity field.

use chipline_models::{CanonicalRecord, Stage, Supplier};

use super::extractor::{
    assign, check_width, extract_rows, is_blank, map_row, read_sheet, FileExtraction, SupplierExtractor,
};
use super::layout::{ColumnMap, FinalTestALayouts, FinalTestBLayout};
use super::workbook::{Sheet, Workbook};
use crate::config::FinalTestMarkers;
use crate::error::ChiplineResult;

#[derive(Debug, Clone)]
pub struct FinalTestAExtractor {
    layouts: FinalTestALayouts,
    markers: FinalTestMarkers,
    backfill: bool,
}

impl FinalTestAExtractor {
    pub fn new(layouts: FinalTestALayouts, markers: FinalTestMarkers, backfill: bool) -> Self {
        Self {
            layouts,
            markers,
            backfill,
        }
    }

    /// Stage and layout for a file, decided by the first marker its name contains.
    pub fn classify(&self, file_name: &str) -> Option<(Stage, &ColumnMap)> {
        [
            (&self.markers.incoming, Stage::FtIncomingUntested, &self.layouts.incoming),
            (&self.markers.wip, Stage::FtWip, &self.layouts.wip),
            (&self.markers.finished, Stage::FtFinishedInventory, &self.layouts.finished),
        ]
        .into_iter()
        .find(|(marker, _, _)| file_name.contains(marker.as_str()))
        .map(|(_, stage, map)| (stage, map))
    }
}

impl SupplierExtractor for FinalTestAExtractor {
    fn supplier(&self) -> Supplier {
        Supplier::FinalTestSubcontractorA
    }

    fn accepts(&self, file_name: &str) -> Result<(), String> {
        match self.classify(file_name) {
            Some(_) => Ok(()),
            None => Err(format!(
                "no extraction rule: file name has none of the markers {}, {}, {}",
                self.markers.incoming, self.markers.wip, self.markers.finished
            )),
        }
    }

    fn extract(&self, file_name: &str, workbook: &mut dyn Workbook) -> FileExtraction {
        let mut out = FileExtraction::default();
        if let Some((stage, map)) = self.classify(file_name) {
            let rows = read_sheet(workbook, &map.sheet)
                .and_then(|sheet| extract_rows(self.supplier(), stage, map, &sheet, self.backfill));
            out.absorb(rows);
        }
        out
    }
}

/// Row status of a subcontractor B export, resolved once per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalTestStatus {
    Incoming,
    Wip,
    Finished,
    Unknown(String),
}

impl FinalTestStatus {
    /// Codes are trimmed and compared case-insensitively.
    pub fn parse(code: &str, layout: &FinalTestBLayout) -> Self {
        let code = code.trim();
        if code.eq_ignore_ascii_case(layout.incoming_code.trim()) {
            Self::Incoming
        } else if code.eq_ignore_ascii_case(layout.wip_code.trim()) {
            Self::Wip
        } else if code.eq_ignore_ascii_case(layout.finished_code.trim()) {
            Self::Finished
        } else {
            Self::Unknown(code.to_string())
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Incoming => Some(Stage::FtIncomingUntested),
            Self::Wip => Some(Stage::FtWip),
            Self::Finished => Some(Stage::FtFinishedInventory),
            Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalTestBExtractor {
    layout: FinalTestBLayout,
    backfill: bool,
}

impl FinalTestBExtractor {
    pub fn new(layout: FinalTestBLayout, backfill: bool) -> Self {
        Self { layout, backfill }
    }

    fn rows(&self, sheet: &Sheet, dropped: &mut Vec<String>) -> ChiplineResult<Vec<CanonicalRecord>> {
        let layout = &self.layout;
        let map = &layout.map;
        let needed = map.max_index().max(Some(layout.quantity_column)).max(Some(layout.status_column));
        check_width(sheet, map.skip_rows, needed)?;

        let mut records = Vec::new();
        for (row, _) in sheet.data_rows(map.skip_rows) {
            let columns = map
                .columns
                .iter()
                .map(|b| b.index)
                .chain([layout.status_column, layout.quantity_column]);
            if is_blank(sheet, row, columns) {
                continue;
            }

            let code = sheet.cell(row, layout.status_column).to_text().unwrap_or_default();
            let status = FinalTestStatus::parse(&code, layout);
            let Some(stage) = status.stage() else {
                dropped.push(code);
                continue;
            };

            let mut record = map_row(Supplier::FinalTestSubcontractorB, stage, map, sheet, row);
            assign(&mut record, stage.quantity_field(), sheet.cell(row, layout.quantity_column));
            records.push(record.normalized(self.backfill));
        }
        Ok(records)
    }
}

impl SupplierExtractor for FinalTestBExtractor {
    fn supplier(&self) -> Supplier {
        Supplier::FinalTestSubcontractorB
    }

    fn extract(&self, _file_name: &str, workbook: &mut dyn Workbook) -> FileExtraction {
        let mut out = FileExtraction::default();
        let mut dropped = Vec::new();
        let rows = read_sheet(workbook, &self.layout.map.sheet).and_then(|sheet| self.rows(&sheet, &mut dropped));
        out.absorb(rows);

        if !dropped.is_empty() {
            dropped.sort();
            dropped.dedup();
            let codes = dropped
                .iter()
                .map(|code| if code.is_empty() { "<blank>" } else { code.as_str() })
                .collect::<Vec<_>>()
                .join(", ");
            out.notes.push(format!("dropped rows with unknown status ({codes})"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::extractor::test_support::*;
    use crate::ingest::layout::Layouts;
    use crate::ingest::workbook::MemoryWorkbook;

    fn ft_a() -> FinalTestAExtractor {
        FinalTestAExtractor::new(Layouts::default().final_test_a, FinalTestMarkers::default(), true)
    }

    fn ft_b() -> FinalTestBExtractor {
        FinalTestBExtractor::new(Layouts::default().final_test_b, true)
    }

    #[test]
    fn test_markers_pick_disjoint_layouts() {
        let extractor = ft_a();
        assert_eq!(extractor.classify("CNEIC_WMS_0301.xlsx").map(|(s, _)| s), Some(Stage::FtIncomingUntested));
        assert_eq!(extractor.classify("CNEIC_WIP_0301.xlsx").map(|(s, _)| s), Some(Stage::FtWip));
        assert_eq!(extractor.classify("CNEIC成品库存.xlsx").map(|(s, _)| s), Some(Stage::FtFinishedInventory));
        assert!(extractor.accepts("CNEIC_misc.xlsx").is_err());
    }

    #[test]
    fn test_wip_file_fills_only_wip_fields() {
        let sheet = Sheet::new(
            "Sheet1",
            vec![
                header(17),
                row(
                    17,
                    &[
                        (3, text("DEV-A")),
                        (4, text("T-100")),
                        (7, text("FT")),
                        (8, text("LOT-1")),
                        (12, num(2410.0)),
                        (15, num(1200.0)),
                        (16, text("BIN1")),
                    ],
                ),
            ],
        );
        let mut book = MemoryWorkbook::new().with_sheet(sheet);
        let out = ft_a().extract("CNEIC_WIP_0301.xlsx", &mut book);

        assert!(out.failures.is_empty());
        let record = &out.records[0];
        assert_eq!(record.stage, Stage::FtWip);
        assert_eq!(record.wip_qty, Some(1200.0));
        assert_eq!(record.quantity, Some(1200.0));
        assert_eq!(record.date_code.as_deref(), Some("2410"));
        assert_eq!(record.inventory_qty, None);
        assert_eq!(record.incoming_qty, None);
    }

    #[test]
    fn test_status_codes_redistribute_quantity() {
        let sheet = Sheet::new(
            "Sheet1",
            vec![
                header(8),
                row(8, &[(0, text("WBT")), (1, text("D1")), (2, text("L1")), (7, num(10.0))]),
                row(8, &[(0, text(" wip ")), (1, text("D1")), (2, text("L2")), (7, num(20.0))]),
                row(8, &[(0, text("WAT")), (1, text("D1")), (2, text("L3")), (7, num(30.0))]),
                row(8, &[(0, text("HOLD")), (1, text("D1")), (2, text("L4")), (7, num(40.0))]),
                row(8, &[]),
            ],
        );
        let mut book = MemoryWorkbook::new().with_sheet(sheet);
        let out = ft_b().extract("HTKS_0301.xlsx", &mut book);

        assert!(out.failures.is_empty());
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.records[0].incoming_qty, Some(10.0));
        assert_eq!(out.records[1].stage, Stage::FtWip);
        assert_eq!(out.records[1].wip_qty, Some(20.0));
        assert_eq!(out.records[1].status_code.as_deref(), Some("wip"));
        assert_eq!(out.records[2].inventory_qty, Some(30.0));
        assert_eq!(out.records[2].wip_qty, None);
        assert!(out.records.iter().all(|r| r.quantity.is_some()));
        assert_eq!(out.notes, vec!["dropped rows with unknown status (HOLD)".to_string()]);
    }

    #[test]
    fn test_status_parse() {
        let layout = Layouts::default().final_test_b;
        assert_eq!(FinalTestStatus::parse("wbt", &layout), FinalTestStatus::Incoming);
        assert_eq!(FinalTestStatus::parse("", &layout).stage(), None);
    }
}
