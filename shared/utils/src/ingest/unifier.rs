//! Merges the per-supplier frames of a refresh into the canonical table.

use chipline_models::{CanonicalRecord, CanonicalTable, Supplier};

/// Rows one supplier produced during a refresh.
#[derive(Debug, Clone)]
pub struct SupplierFrame {
    pub supplier: Supplier,
    pub records: Vec<CanonicalRecord>,
}

impl SupplierFrame {
    pub fn new(supplier: Supplier, records: Vec<CanonicalRecord>) -> Self {
        Self { supplier, records }
    }

    /// Columns this supplier's layouts can populate.
    #[cfg(test)]
    fn columns(&self) -> std::collections::BTreeSet<chipline_models::CanonicalField> {
        self.supplier
            .stages()
            .iter()
            .flat_map(|stage| stage.fields().iter().copied())
            .collect()
    }
}

/// Concatenates supplier frames into one table over the full canonical column
/// set, in canonical supplier order.
#[derive(Debug, Clone)]
pub struct SchemaUnifier {
    emit_placeholders: bool,
}

impl SchemaUnifier {
    pub fn new(emit_placeholders: bool) -> Self {
        Self { emit_placeholders }
    }

    pub fn placeholders(supplier: Supplier) -> Vec<CanonicalRecord> {
        supplier
            .stages()
            .iter()
            .map(|stage| CanonicalRecord::placeholder(supplier, *stage))
            .collect()
    }

    pub fn unify(&self, mut frames: Vec<SupplierFrame>) -> CanonicalTable {
        let mut records = Vec::with_capacity(frames.iter().map(|f| f.records.len()).sum());
        for supplier in Supplier::ALL {
            let rows: Vec<CanonicalRecord> = frames
                .iter_mut()
                .filter(|frame| frame.supplier == supplier)
                .flat_map(|frame| std::mem::take(&mut frame.records))
                .collect();
            if rows.is_empty() {
                if self.emit_placeholders {
                    records.extend(Self::placeholders(supplier));
                }
            } else {
                records.extend(rows);
            }
        }
        CanonicalTable::new(records)
    }
}

impl Default for SchemaUnifier {
    fn default() -> Self {
        Self::new(true)
    }
}
