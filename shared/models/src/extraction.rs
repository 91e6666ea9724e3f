//! Per-file extraction outcomes.

use serde::{Deserialize, Serialize};

use crate::supplier::Supplier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    Error,
    /// The file matched a supplier's naming rule but no extraction rule.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    pub file: String,
    pub supplier: Supplier,
    pub status: ExtractionStatus,
    pub message: String,
}

/// Ordered record of what happened to every candidate file during a refresh.
/// Appending never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionLog {
    entries: Vec<ExtractionEntry>,
}

impl ExtractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, supplier: Supplier, file: &str, message: impl Into<String>) {
        self.push(supplier, file, ExtractionStatus::Success, message.into());
    }

    pub fn error(&mut self, supplier: Supplier, file: &str, message: impl Into<String>) {
        self.push(supplier, file, ExtractionStatus::Error, message.into());
    }

    pub fn skipped(&mut self, supplier: Supplier, file: &str, message: impl Into<String>) {
        self.push(supplier, file, ExtractionStatus::Skipped, message.into());
    }

    fn push(&mut self, supplier: Supplier, file: &str, status: ExtractionStatus, message: String) {
        self.entries.push(ExtractionEntry {
            file: file.to_string(),
            supplier,
            status,
            message,
        });
    }

    pub fn entries(&self) -> &[ExtractionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: ExtractionStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(ExtractionStatus::Error) > 0
    }

    pub fn entries_for<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a ExtractionEntry> {
        self.entries.iter().filter(move |e| e.file == file)
    }

    /// Short status line for the dashboard's file-status toggle.
    pub fn headline(&self) -> &'static str {
        if self.has_errors() {
            "File read failed"
        } else {
            "Files read successfully"
        }
    }
}
