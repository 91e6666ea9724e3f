//! One refresh: list the drop directory, run every supplier extractor over its
//! files, and unify the results.
//!
//! A refresh only fails as a whole when the directory itself is unusable. Any
//! problem with a single file is written to the [`ExtractionLog`] and the
//! batch moves on.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use chipline_models::{CanonicalTable, ExtractionLog, ExtractionStatus};

use super::assembly::AssemblyExtractor;
use super::bonding::BondingExtractor;
use super::extractor::{FileExtraction, StageAnomaly, SupplierExtractor};
use super::final_test::{FinalTestAExtractor, FinalTestBExtractor};
use super::resolver::CurrentStageResolver;
use super::selector::FileSelector;
use super::unifier::{SchemaUnifier, SupplierFrame};
use super::workbook::{CalamineOpener, WorkbookOpener};
use crate::config::AppConfig;
use crate::error::{ChiplineError, ChiplineResult};

/// Result of one refresh. Built fresh every time; nothing is cached.
#[derive(Debug, Clone, Default)]
pub struct Refresh {
    pub table: CanonicalTable,
    pub log: ExtractionLog,
    pub anomalies: Vec<StageAnomaly>,
}

pub struct Pipeline {
    directory: PathBuf,
    selector: FileSelector,
    extractors: Vec<Box<dyn SupplierExtractor>>,
    unifier: SchemaUnifier,
    opener: Arc<dyn WorkbookOpener>,
}

impl Pipeline {
    /// Builds the pipeline from configuration. Layout tables are validated
    /// here, once, so a bad override fails at startup.
    pub fn from_config(config: &AppConfig) -> ChiplineResult<Self> {
        config.layouts.validate()?;

        let backfill = config.ingest.backfill_device_aliases;
        let layouts = config.layouts.clone();
        let extractors: Vec<Box<dyn SupplierExtractor>> = vec![
            Box::new(BondingExtractor::new(layouts.bonding, backfill)),
            Box::new(AssemblyExtractor::new(
                layouts.assembly,
                CurrentStageResolver::new(config.ingest.multi_stage_policy),
                backfill,
            )),
            Box::new(FinalTestAExtractor::new(
                layouts.final_test_a,
                config.source.final_test_a_markers.clone(),
                backfill,
            )),
            Box::new(FinalTestBExtractor::new(layouts.final_test_b, backfill)),
        ];

        Ok(Self {
            directory: config.source.directory.clone(),
            selector: FileSelector::from_config(&config.source),
            extractors,
            unifier: SchemaUnifier::new(config.ingest.emit_placeholders),
            opener: Arc::new(CalamineOpener),
        })
    }

    /// Replaces the workbook opener, e.g. with an in-memory one in tests.
    pub fn with_opener(mut self, opener: impl WorkbookOpener + 'static) -> Self {
        self.opener = Arc::new(opener);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Refreshes from the configured source directory.
    pub fn refresh(&self) -> ChiplineResult<Refresh> {
        self.refresh_from(&self.directory)
    }

    pub fn refresh_from(&self, directory: &Path) -> ChiplineResult<Refresh> {
        let started = Instant::now();
        let listing = list_directory(directory)?;

        let mut log = ExtractionLog::new();
        let mut anomalies = Vec::new();
        let mut frames = Vec::with_capacity(self.extractors.len());

        for extractor in &self.extractors {
            let supplier = extractor.supplier();
            let files = self.selector.select(&listing, supplier);
            debug!(supplier = %supplier, files = files.len(), "selected files");

            let mut records = Vec::new();
            for file in &files {
                if let Err(reason) = extractor.accepts(file) {
                    warn!(supplier = %supplier, file = %file, %reason, "file skipped");
                    log.skipped(supplier, file, reason);
                    continue;
                }

                let extraction = match self.opener.open(&directory.join(file)) {
                    Ok(mut workbook) => extractor.extract(file, workbook.as_mut()),
                    Err(error) => FileExtraction::failed(error),
                };
                let (message, status) = describe(&extraction);
                match status {
                    ExtractionStatus::Error => {
                        warn!(supplier = %supplier, file = %file, error = %message, "file extraction failed");
                        log.error(supplier, file, message);
                    }
                    _ => {
                        debug!(supplier = %supplier, file = %file, rows = extraction.records.len(), "file extracted");
                        log.success(supplier, file, message);
                    }
                }
                records.extend(extraction.records);
                anomalies.extend(extraction.anomalies);
            }
            frames.push(SupplierFrame::new(supplier, records));
        }

        let table = self.unifier.unify(frames);
        info!(
            directory = %directory.display(),
            rows = table.len(),
            files = log.len(),
            errors = log.count(ExtractionStatus::Error),
            skipped = log.count(ExtractionStatus::Skipped),
            anomalies = anomalies.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh complete"
        );

        Ok(Refresh {
            table,
            log,
            anomalies,
        })
    }
}

/// File names in `directory`. A missing directory is fatal; unreadable or
/// non-UTF-8 entries are left out. Symlinks count as files when their target
/// is one.
pub fn list_directory(directory: &Path) -> ChiplineResult<Vec<String>> {
    if !directory.is_dir() {
        return Err(ChiplineError::directory_not_found(directory.display().to_string()));
    }
    let entries = fs::read_dir(directory)
        .map_err(|e| ChiplineError::from_io(directory.display().to_string(), &e))?;

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

/// One log line per file. Failures from several sheets are joined, and rows
/// that were still extracted are mentioned so the error is not read as "file
/// ignored".
fn describe(extraction: &FileExtraction) -> (String, ExtractionStatus) {
    let rows = extraction.records.len();
    let mut parts = Vec::new();

    if extraction.failures.is_empty() {
        parts.push(format!("{rows} rows extracted"));
    } else {
        parts.extend(extraction.failures.iter().map(ToString::to_string));
        if rows > 0 {
            parts.push(format!("{rows} rows kept from readable sheets"));
        }
    }
    parts.extend(extraction.notes.iter().cloned());

    let status = if extraction.failures.is_empty() {
        ExtractionStatus::Success
    } else {
        ExtractionStatus::Error
    };
    (parts.join("; "), status)
}
