//! Spreadsheet access.
//!
//! Supplier layouts are positional, so every sheet is exposed as an absolute
//! grid: row 0 is spreadsheet row 1 and column 0 is column A, regardless of
//! where the used range starts. Decoding goes through calamine; the decoder is
//! picked from the file extension alone.

use calamine::{DataType, Range, Reader, Xls, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::error::{ChiplineError, ChiplineResult};

/// Supported spreadsheet containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Legacy binary workbook (`.xls`)
    Xls,
    /// Office Open XML workbook (`.xlsx`)
    Xlsx,
}

impl SpreadsheetFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// One decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (days since 1899-12-30).
    DateTime(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric coercion. Unparseable or missing values become `None`; this never fails.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Bool(b) => f64::from(u8::from(*b)),
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            Cell::Empty | Cell::DateTime(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Text rendering for identifier-like fields. Blank cells are `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(serial) => Some(excel_serial_to_text(*serial)),
        }
    }
}

impl From<&DataType> for Cell {
    fn from(value: &DataType) -> Self {
        match value {
            DataType::Int(i) => Cell::Number(*i as f64),
            DataType::Float(f) => Cell::Number(*f),
            DataType::String(s) => Cell::Text(s.clone()),
            DataType::Bool(b) => Cell::Bool(*b),
            DataType::DateTime(serial) => Cell::DateTime(*serial),
            DataType::Empty | DataType::Error(_) => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

fn excel_serial_to_text(serial: f64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    // 2_958_465 is 9999-12-31, the last date Excel can represent.
    let moment: Option<NaiveDateTime> = (0.0..2_958_466.0)
        .contains(&serial)
        .then(|| Duration::milliseconds((serial * 86_400_000.0).round() as i64))
        .and_then(|offset| epoch.checked_add_signed(offset));
    let Some(moment) = moment else {
        return serial.to_string();
    };
    if moment.num_seconds_from_midnight() == 0 {
        moment.format("%Y-%m-%d").to_string()
    } else {
        moment.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A sheet as an absolute grid of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

static EMPTY: Cell = Cell::Empty;

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds the absolute grid from a calamine range, padding the rows and
    /// columns before the used range's start.
    pub fn from_range(name: &str, range: &Range<DataType>) -> Self {
        let (row0, col0) = range.start().unwrap_or((0, 0));
        let mut rows = vec![Vec::new(); row0 as usize];
        for source in range.rows() {
            let mut cells = vec![Cell::Empty; col0 as usize];
            cells.extend(source.iter().map(Cell::from));
            rows.push(cells);
        }
        Self::new(name, rows)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Data rows after `skip` header rows, with their absolute row index.
    pub fn data_rows(&self, skip: usize) -> impl Iterator<Item = (usize, &[Cell])> {
        self.rows
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(idx, row)| (idx, row.as_slice()))
    }
}

/// Read access to the sheets of one opened workbook.
pub trait Workbook {
    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&mut self, name: &str) -> ChiplineResult<Sheet>;

    fn first_sheet(&mut self) -> ChiplineResult<Sheet> {
        let name = self
            .sheet_names()
            .into_iter()
            .next()
            .ok_or_else(|| ChiplineError::workbook("workbook contains no sheets"))?;
        self.sheet(&name)
    }
}

/// Opens a workbook for a path. The pipeline only sees this seam, so tests can
/// feed in-memory workbooks.
pub trait WorkbookOpener: Send + Sync {
    fn open(&self, path: &Path) -> ChiplineResult<Box<dyn Workbook>>;
}

impl<F> WorkbookOpener for F
where
    F: Fn(&Path) -> ChiplineResult<Box<dyn Workbook>> + Send + Sync,
{
    fn open(&self, path: &Path) -> ChiplineResult<Box<dyn Workbook>> {
        self(path)
    }
}

/// Opens workbooks from disk with calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineOpener;

impl WorkbookOpener for CalamineOpener {
    fn open(&self, path: &Path) -> ChiplineResult<Box<dyn Workbook>> {
        let display = path.display().to_string();
        let format = SpreadsheetFormat::from_extension(path)
            .ok_or_else(|| ChiplineError::workbook(format!("unsupported file type: {display}")))?;
        let file = File::open(path).map_err(|e| ChiplineError::from_io(&display, &e))?;
        let reader = BufReader::new(file);

        let book = match format {
            SpreadsheetFormat::Xlsx => CalamineWorkbook::Xlsx(Xlsx::new(reader)?),
            SpreadsheetFormat::Xls => CalamineWorkbook::Xls(Xls::new(reader)?),
        };
        Ok(Box::new(book))
    }
}

pub enum CalamineWorkbook {
    Xlsx(Xlsx<BufReader<File>>),
    Xls(Xls<BufReader<File>>),
}

impl Workbook for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        match self {
            Self::Xlsx(book) => book.sheet_names().to_vec(),
            Self::Xls(book) => book.sheet_names().to_vec(),
        }
    }

    fn sheet(&mut self, name: &str) -> ChiplineResult<Sheet> {
        match self {
            Self::Xlsx(book) => load_sheet(book, name),
            Self::Xls(book) => load_sheet(book, name),
        }
    }
}

fn load_sheet<RS, R>(book: &mut R, name: &str) -> ChiplineResult<Sheet>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let range = book
        .worksheet_range(name)
        .ok_or_else(|| ChiplineError::missing_sheet(name))?
        .map_err(|e| ChiplineError::workbook(format!("sheet {name}: {e}")))?;
    Ok(Sheet::from_range(name, &range))
}

/// Workbook held in memory, sheets in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<Sheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.push(sheet);
        self
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&mut self, name: &str) -> ChiplineResult<Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| ChiplineError::missing_sheet(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SpreadsheetFormat::from_extension(Path::new("123.xlsx")), Some(SpreadsheetFormat::Xlsx));
        assert_eq!(SpreadsheetFormat::from_extension(Path::new("ITS.a.xls")), Some(SpreadsheetFormat::Xls));
        assert_eq!(SpreadsheetFormat::from_extension(Path::new("123.XLSX")), None);
        assert_eq!(SpreadsheetFormat::from_extension(Path::new("123.csv")), None);
    }

    #[test]
    fn test_numeric_coercion_never_fails() {
        assert_eq!(Cell::Number(7.0).to_number(), Some(7.0));
        assert_eq!(Cell::Text(" 12.5 ".into()).to_number(), Some(12.5));
        assert_eq!(Cell::Text("n/a".into()).to_number(), None);
        assert_eq!(Cell::Text("NaN".into()).to_number(), None);
        assert_eq!(Cell::Empty.to_number(), None);
        assert_eq!(Cell::Bool(true).to_number(), Some(1.0));
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Cell::Number(2412.0).to_text().as_deref(), Some("2412"));
        assert_eq!(Cell::Text("  LOT1 ".into()).to_text().as_deref(), Some("LOT1"));
        assert_eq!(Cell::Text("   ".into()).to_text(), None);
        assert_eq!(Cell::DateTime(45352.0).to_text().as_deref(), Some("2024-03-01"));
        assert_eq!(Cell::DateTime(45352.5).to_text().as_deref(), Some("2024-03-01 12:00:00"));
    }

    #[test]
    fn test_sheet_cells_out_of_range_are_empty() {
        let sheet = Sheet::new("s", vec![vec![Cell::Number(1.0)], vec![]]);
        assert_eq!(sheet.cell(0, 0), &Cell::Number(1.0));
        assert_eq!(sheet.cell(1, 3), &Cell::Empty);
        assert_eq!(sheet.cell(9, 9), &Cell::Empty);
        assert_eq!(sheet.width(), 1);
    }

    #[test]
    fn test_memory_workbook_reports_missing_sheet() {
        let mut book = MemoryWorkbook::new().with_sheet(Sheet::new("wip", vec![]));
        assert!(book.sheet("wip").is_ok());
        let err = book.sheet("Finished Products").unwrap_err();
        assert_eq!(err.error_code(), "MISSING_SHEET");
        assert_eq!(book.first_sheet().unwrap().name, "wip");
    }

    #[test]
    fn test_calamine_opener_rejects_corrupt_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240301.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        let err = CalamineOpener.open(&path).err().unwrap();
        assert_eq!(err.error_code(), "WORKBOOK_ERROR");
    }
}
