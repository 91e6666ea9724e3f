//! Positional column contracts with each supplier's exports.
//!
//! Header text in the supplier files drifts but column order does not, so the
//! extractors bind by column index. The tables below are plain data: a layout
//! change upstream is an edit here (or in the `layouts` config section), with
//! the `version` bumped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use chipline_models::{CanonicalField, Stage, Supplier};

use crate::error::{ChiplineError, ChiplineResult};

/// Which sheet of the workbook a map reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelector {
    Named(String),
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub index: usize,
    pub field: CanonicalField,
}

/// {source column index → canonical field} for one supplier sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub version: u32,
    pub sheet: SheetSelector,
    /// Header/metadata rows above the first data row.
    pub skip_rows: usize,
    pub columns: Vec<ColumnBinding>,
}

impl ColumnMap {
    fn new(sheet: SheetSelector, skip_rows: usize, columns: &[(usize, CanonicalField)]) -> Self {
        Self {
            version: 1,
            sheet,
            skip_rows,
            columns: columns
                .iter()
                .map(|&(index, field)| ColumnBinding { index, field })
                .collect(),
        }
    }

    /// Highest column index this map reads, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.columns.iter().map(|b| b.index).max()
    }

    pub fn sheet_label(&self) -> &str {
        match &self.sheet {
            SheetSelector::Named(name) => name,
            SheetSelector::First => "<first sheet>",
        }
    }

    /// Checks that every bound field belongs to `stage` and no column or field
    /// is bound twice.
    pub fn validate_for(&self, stage: Stage) -> ChiplineResult<()> {
        let mut indices = HashSet::new();
        let mut fields = HashSet::new();
        for binding in &self.columns {
            if !stage.allows(binding.field) || binding.field == CanonicalField::Quantity {
                return Err(ChiplineError::configuration(format!(
                    "layout for {} binds {} which stage {} does not carry",
                    self.sheet_label(),
                    binding.field,
                    stage
                )));
            }
            if !indices.insert(binding.index) || !fields.insert(binding.field) {
                return Err(ChiplineError::configuration(format!(
                    "layout for {} binds column {} or field {} twice",
                    self.sheet_label(),
                    binding.index,
                    binding.field
                )));
            }
        }
        Ok(())
    }
}

/// Assembly in-process sheet: regular columns plus the block of stage-quantity
/// columns whose names live in a fixed header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBlockLayout {
    pub map: ColumnMap,
    pub stage_name_row: usize,
    pub first_stage_column: usize,
    pub last_stage_column: usize,
}

impl StageBlockLayout {
    pub fn stage_columns(&self) -> std::ops::RangeInclusive<usize> {
        self.first_stage_column..=self.last_stage_column
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondingLayouts {
    pub in_process: ColumnMap,
    pub completed: ColumnMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyLayouts {
    pub in_process: StageBlockLayout,
    pub completed: ColumnMap,
}

/// One map per file kind; the file-name marker decides which applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTestALayouts {
    pub incoming: ColumnMap,
    pub wip: ColumnMap,
    pub finished: ColumnMap,
}

/// Single sheet carrying all three final-test stages, told apart per row by a
/// status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTestBLayout {
    pub map: ColumnMap,
    pub status_column: usize,
    pub quantity_column: usize,
    pub incoming_code: String,
    pub wip_code: String,
    pub finished_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layouts {
    pub bonding: BondingLayouts,
    pub assembly: AssemblyLayouts,
    pub final_test_a: FinalTestALayouts,
    pub final_test_b: FinalTestBLayout,
}

impl Layouts {
    pub fn validate(&self) -> ChiplineResult<()> {
        self.bonding.in_process.validate_for(Stage::BpInProcess)?;
        self.bonding.completed.validate_for(Stage::BpCompleted)?;
        self.assembly.in_process.map.validate_for(Stage::AsyInProcess)?;
        self.assembly.completed.validate_for(Stage::AsyCompleted)?;
        self.final_test_a.incoming.validate_for(Stage::FtIncomingUntested)?;
        self.final_test_a.wip.validate_for(Stage::FtWip)?;
        self.final_test_a.finished.validate_for(Stage::FtFinishedInventory)?;

        let block = &self.assembly.in_process;
        if block.first_stage_column > block.last_stage_column {
            return Err(ChiplineError::configuration("assembly stage block is empty"));
        }
        if block.stage_name_row >= block.map.skip_rows {
            return Err(ChiplineError::configuration(
                "assembly stage-name row must lie inside the skipped header block",
            ));
        }

        // FT-B bindings are shared by all three stages.
        let ftb = &self.final_test_b;
        for stage in Supplier::FinalTestSubcontractorB.stages() {
            ftb.map.validate_for(*stage)?;
        }
        if ftb.map.columns.iter().any(|b| b.index == ftb.quantity_column) {
            return Err(ChiplineError::configuration(
                "final-test B quantity column is also bound as a field",
            ));
        }
        Ok(())
    }
}

impl Default for Layouts {
    fn default() -> Self {
        use CanonicalField as F;

        let named = |name: &str| SheetSelector::Named(name.to_string());

        Self {
            bonding: BondingLayouts {
                in_process: ColumnMap::new(
                    named("wip"),
                    1,
                    &[(1, F::LotNo), (5, F::WaferModel), (7, F::WaferQty)],
                ),
                completed: ColumnMap::new(
                    named("Finished Products"),
                    1,
                    &[
                        (1, F::WaferModel),
                        (2, F::WarehouseInDate),
                        (3, F::GoodDieQty),
                        (4, F::LotNo),
                    ],
                ),
            },
            assembly: AssemblyLayouts {
                in_process: StageBlockLayout {
                    map: ColumnMap::new(
                        named("ATX WIP"),
                        6,
                        &[
                            (1, F::DeviceName),
                            (4, F::LotNo),
                            (7, F::AssemblyPo),
                            (9, F::OrderQty),
                            (12, F::StartTime),
                        ],
                    ),
                    stage_name_row: 5,
                    first_stage_column: 13,
                    last_stage_column: 22,
                },
                completed: ColumnMap::new(
                    named("ATX FG"),
                    6,
                    &[
                        (1, F::CompletedQty),
                        (2, F::LotNo),
                        (8, F::DeviceName),
                        (13, F::DateCode),
                    ],
                ),
            },
            final_test_a: FinalTestALayouts {
                incoming: ColumnMap::new(
                    SheetSelector::First,
                    1,
                    &[(5, F::DeviceName), (7, F::LotNo), (16, F::IncomingQty)],
                ),
                wip: ColumnMap::new(
                    SheetSelector::First,
                    1,
                    &[
                        (3, F::DeviceName),
                        (4, F::TestOrderNo),
                        (7, F::TestType),
                        (8, F::LotNo),
                        (12, F::DateCode),
                        (15, F::WipQty),
                        (16, F::Bin),
                    ],
                ),
                finished: ColumnMap::new(
                    SheetSelector::First,
                    1,
                    &[
                        (3, F::TestOrderNo),
                        (5, F::DeviceName),
                        (11, F::LotNo),
                        (13, F::DateCode),
                        (16, F::Bin),
                        (17, F::InventoryQty),
                    ],
                ),
            },
            final_test_b: FinalTestBLayout {
                map: ColumnMap::new(
                    SheetSelector::First,
                    1,
                    &[
                        (0, F::StatusCode),
                        (1, F::DeviceName),
                        (2, F::LotNo),
                        (3, F::TestOrderNo),
                        (4, F::TestType),
                        (5, F::DateCode),
                        (6, F::Bin),
                    ],
                ),
                status_column: 0,
                quantity_column: 7,
                incoming_code: "WBT".to_string(),
                wip_code: "WIP".to_string(),
                finished_code: "WAT".to_string(),
            },
        }
    }
}
