//! Common extractor contract and the positional slicing every supplier shares.

use serde::{Deserialize, Serialize};

use chipline_models::{CanonicalField, CanonicalRecord, FieldKind, Stage, Supplier};

use super::layout::{ColumnMap, SheetSelector};
use super::workbook::{Cell, Sheet, Workbook};
use crate::error::{ChiplineError, ChiplineResult};

/// An assembly lot with quantity in more than one stage column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAnomaly {
    pub file: String,
    pub lot_no: Option<String>,
    pub stages: Vec<String>,
}

/// Everything one file produced. A file can yield rows and failures at the
/// same time when only some of its sheets could be read.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub records: Vec<CanonicalRecord>,
    pub failures: Vec<ChiplineError>,
    /// Extra remarks for the log line, e.g. dropped rows.
    pub notes: Vec<String>,
    pub anomalies: Vec<StageAnomaly>,
}

impl FileExtraction {
    /// Folds the outcome of one sheet into the file result.
    pub fn absorb(&mut self, sheet: ChiplineResult<Vec<CanonicalRecord>>) {
        match sheet {
            Ok(records) => self.records.extend(records),
            Err(error) => self.failures.push(error),
        }
    }

    pub fn failed(error: ChiplineError) -> Self {
        Self {
            failures: vec![error],
            ..Self::default()
        }
    }
}

pub trait SupplierExtractor: Send + Sync {
    fn supplier(&self) -> Supplier;

    /// Checked before the file is opened. `Err` carries the reason the file is
    /// skipped; a skip is not a failure.
    fn accepts(&self, _file_name: &str) -> Result<(), String> {
        Ok(())
    }

    /// Never panics and never returns early on a bad sheet: failures are
    /// collected in the result.
    fn extract(&self, file_name: &str, workbook: &mut dyn Workbook) -> FileExtraction;
}

pub fn read_sheet(workbook: &mut dyn Workbook, selector: &SheetSelector) -> ChiplineResult<Sheet> {
    match selector {
        SheetSelector::Named(name) => workbook.sheet(name),
        SheetSelector::First => workbook.first_sheet(),
    }
}

/// Spreadsheet column letter for a zero-based index (0 → A, 26 → AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn has_data(sheet: &Sheet, skip: usize) -> bool {
    sheet
        .data_rows(skip)
        .any(|(_, row)| row.iter().any(|cell| !cell.is_empty()))
}

/// Fails when the sheet has data but is too narrow for column `needed`.
pub fn check_width(sheet: &Sheet, skip: usize, needed: Option<usize>) -> ChiplineResult<()> {
    let Some(needed) = needed else {
        return Ok(());
    };
    if needed < sheet.width() || !has_data(sheet, skip) {
        return Ok(());
    }
    Err(ChiplineError::layout(
        &sheet.name,
        format!(
            "column {} ({}) is missing, sheet has {} columns",
            needed,
            column_letter(needed),
            sheet.width()
        ),
    ))
}

pub fn is_blank(sheet: &Sheet, row: usize, columns: impl IntoIterator<Item = usize>) -> bool {
    columns
        .into_iter()
        .all(|col| sheet.cell(row, col).is_empty())
}

/// Stores `cell` into `field`, coerced by the field's kind.
pub fn assign(record: &mut CanonicalRecord, field: CanonicalField, cell: &Cell) -> bool {
    match field.kind() {
        FieldKind::Text => record.set_text(field, cell.to_text()),
        FieldKind::Quantity => record.set_quantity(field, cell.to_number()),
        FieldKind::Tag => false,
    }
}

/// Slices one data row through `map`. The row is not normalized yet.
pub fn map_row(
    supplier: Supplier,
    stage: Stage,
    map: &ColumnMap,
    sheet: &Sheet,
    row: usize,
) -> CanonicalRecord {
    let mut record = CanonicalRecord::new(supplier, stage);
    for binding in &map.columns {
        assign(&mut record, binding.field, sheet.cell(row, binding.index));
    }
    record
}

/// Extracts every non-blank data row of `sheet` as `stage` rows.
pub fn extract_rows(
    supplier: Supplier,
    stage: Stage,
    map: &ColumnMap,
    sheet: &Sheet,
    backfill: bool,
) -> ChiplineResult<Vec<CanonicalRecord>> {
    check_width(sheet, map.skip_rows, map.max_index())?;

    let records = sheet
        .data_rows(map.skip_rows)
        .map(|(row, _)| row)
        .filter(|row| !is_blank(sheet, *row, map.columns.iter().map(|b| b.index)))
        .map(|row| map_row(supplier, stage, map, sheet, row).normalized(backfill))
        .collect();
    Ok(records)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::super::workbook::Cell;

    pub fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    pub fn num(value: f64) -> Cell {
        Cell::Number(value)
    }

    /// Row with `cells` placed at the given absolute columns.
    pub fn row(width: usize, cells: &[(usize, Cell)]) -> Vec<Cell> {
        let mut out = vec![Cell::Empty; width];
        for (col, cell) in cells {
            out[*col] = cell.clone();
        }
        out
    }

    pub fn header(width: usize) -> Vec<Cell> {
        (0..width).map(|i| Cell::Text(format!("h{i}"))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::ingest::layout::Layouts;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(7), "H");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
    }

    #[test]
    fn test_extract_rows_coerces_and_drops_blank_rows() {
        let map = Layouts::default().bonding.in_process;
        let sheet = Sheet::new(
            "wip",
            vec![
                header(8),
                row(8, &[(1, text("L1")), (5, text("W-1")), (7, num(25.0))]),
                row(8, &[]),
                row(8, &[(1, text("L2")), (7, text("n/a"))]),
            ],
        );
        let records = extract_rows(Supplier::BondingPartner, Stage::BpInProcess, &map, &sheet, true).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quantity, Some(25.0));
        assert_eq!(records[0].device_name.as_deref(), Some("W-1"));
        assert_eq!(records[1].lot_no.as_deref(), Some("L2"));
        assert_eq!(records[1].wafer_qty, None);
        assert_eq!(records[1].quantity, None);
    }

    #[test]
    fn test_narrow_sheet_with_data_is_a_layout_error() {
        let map = Layouts::default().bonding.in_process;
        let sheet = Sheet::new("wip", vec![header(4), row(4, &[(1, text("L1"))])]);
        let err = extract_rows(Supplier::BondingPartner, Stage::BpInProcess, &map, &sheet, true).unwrap_err();
        assert_eq!(err.error_code(), "LAYOUT_ERROR");
        assert!(err.to_string().contains("column 7 (H)"));
    }

    #[test]
    fn test_narrow_sheet_without_data_yields_nothing() {
        let map = Layouts::default().bonding.in_process;
        let sheet = Sheet::new("wip", vec![header(3)]);
        let records = extract_rows(Supplier::BondingPartner, Stage::BpInProcess, &map, &sheet, true).unwrap();
        assert!(records.is_empty());
    }
}
