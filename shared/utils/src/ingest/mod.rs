//! Production-status ingestion
//!
//! Reads the supplier spreadsheets dropped in the source directory and
//! normalizes them into one canonical table, then filters and aggregates it
//! for the dashboard.

pub mod selector;
pub mod layout;
pub mod workbook;
pub mod resolver;
pub mod extractor;
pub mod bonding;
pub mod assembly;
pub mod final_test;
pub mod unifier;
pub mod pipeline;
pub mod filter;

pub use selector::{FileSelector, NamingRule};
pub use layout::{ColumnMap, Layouts, SheetSelector};
pub use workbook::{CalamineOpener, Cell, MemoryWorkbook, Sheet, Workbook, WorkbookOpener};
pub use resolver::{CurrentStageResolver, MultiStagePolicy, StageResolution};
pub use extractor::{FileExtraction, StageAnomaly, SupplierExtractor};
pub use final_test::FinalTestStatus;
pub use unifier::{SchemaUnifier, SupplierFrame};
pub use pipeline::{Pipeline, Refresh};
pub use filter::{
    parse_choice, parse_multi, FilterEngine, FilterSpec, FilteredView, LotTrace, ProjectedRow, ProjectedView,
    StageLoad, StageTotal, TargetColumns,
};
