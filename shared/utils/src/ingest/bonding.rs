//! BondingPartner exports: one workbook, an in-process sheet and a completed sheet.

use chipline_models::{Stage, Supplier};

use super::extractor::{extract_rows, read_sheet, FileExtraction, SupplierExtractor};
use super::layout::{BondingLayouts, ColumnMap};
use super::workbook::Workbook;

#[derive(Debug, Clone)]
pub struct BondingExtractor {
    layouts: BondingLayouts,
    backfill: bool,
}

impl BondingExtractor {
    pub fn new(layouts: BondingLayouts, backfill: bool) -> Self {
        Self { layouts, backfill }
    }

    fn sheets(&self) -> [(Stage, &ColumnMap); 2] {
        [
            (Stage::BpInProcess, &self.layouts.in_process),
            (Stage::BpCompleted, &self.layouts.completed),
        ]
    }
}

impl SupplierExtractor for BondingExtractor {
    fn supplier(&self) -> Supplier {
        Supplier::BondingPartner
    }

    fn extract(&self, _file_name: &str, workbook: &mut dyn Workbook) -> FileExtraction {
        let mut out = FileExtraction::default();
        // Sheets are independent: a missing completed sheet keeps the WIP rows.
        for (stage, map) in self.sheets() {
            let rows = read_sheet(workbook, &map.sheet)
                .and_then(|sheet| extract_rows(self.supplier(), stage, map, &sheet, self.backfill));
            out.absorb(rows);
        }
        out
    }
}
