//! Supplier and process-stage identifiers.
//!
//! Every canonical row is tagged with the subcontractor that exported it and the
//! supplier-scoped stage the lot was observed in. Both serialize to the labels
//! the dashboard displays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::record::CanonicalField;

/// Outside subcontractor whose spreadsheets feed the production board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Supplier {
    #[serde(rename = "BondingPartner")]
    BondingPartner,
    #[serde(rename = "AssemblySubcontractor")]
    AssemblySubcontractor,
    #[serde(rename = "FinalTestSubcontractor-A")]
    FinalTestSubcontractorA,
    #[serde(rename = "FinalTestSubcontractor-B")]
    FinalTestSubcontractorB,
}

/// Process stage a lot was observed in. Stages are scoped to the supplier that
/// reports them; both final-test subcontractors share the `FT_*` stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "BP_in_process")]
    BpInProcess,
    #[serde(rename = "BP_completed")]
    BpCompleted,
    #[serde(rename = "ASY_in_process")]
    AsyInProcess,
    #[serde(rename = "ASY_completed")]
    AsyCompleted,
    #[serde(rename = "FT_incoming_untested")]
    FtIncomingUntested,
    #[serde(rename = "FT_wip")]
    FtWip,
    #[serde(rename = "FT_finished_inventory")]
    FtFinishedInventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} label: {label}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub label: String,
}

impl Supplier {
    /// Canonical supplier order, used for concatenation and view lookups.
    pub const ALL: [Supplier; 4] = [
        Supplier::BondingPartner,
        Supplier::AssemblySubcontractor,
        Supplier::FinalTestSubcontractorA,
        Supplier::FinalTestSubcontractorB,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BondingPartner => "BondingPartner",
            Self::AssemblySubcontractor => "AssemblySubcontractor",
            Self::FinalTestSubcontractorA => "FinalTestSubcontractor-A",
            Self::FinalTestSubcontractorB => "FinalTestSubcontractor-B",
        }
    }

    /// Stages this supplier reports, in display order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::BondingPartner => &[Stage::BpInProcess, Stage::BpCompleted],
            Self::AssemblySubcontractor => &[Stage::AsyInProcess, Stage::AsyCompleted],
            Self::FinalTestSubcontractorA | Self::FinalTestSubcontractorB => &[
                Stage::FtIncomingUntested,
                Stage::FtWip,
                Stage::FtFinishedInventory,
            ],
        }
    }

    pub fn reports(&self, stage: Stage) -> bool {
        self.stages().contains(&stage)
    }
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::BpInProcess,
        Stage::BpCompleted,
        Stage::AsyInProcess,
        Stage::AsyCompleted,
        Stage::FtIncomingUntested,
        Stage::FtWip,
        Stage::FtFinishedInventory,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BpInProcess => "BP_in_process",
            Self::BpCompleted => "BP_completed",
            Self::AsyInProcess => "ASY_in_process",
            Self::AsyCompleted => "ASY_completed",
            Self::FtIncomingUntested => "FT_incoming_untested",
            Self::FtWip => "FT_wip",
            Self::FtFinishedInventory => "FT_finished_inventory",
        }
    }

    /// First supplier, in canonical order, that reports this stage.
    pub fn primary_supplier(&self) -> Supplier {
        Supplier::ALL
            .into_iter()
            .find(|supplier| supplier.reports(*self))
            .unwrap_or(Supplier::BondingPartner)
    }

    /// Named field whose value becomes the normalized `quantity` of a row.
    pub fn quantity_field(&self) -> CanonicalField {
        match self {
            Self::BpInProcess => CanonicalField::WaferQty,
            Self::BpCompleted => CanonicalField::GoodDieQty,
            Self::AsyInProcess => CanonicalField::CurrentStageQty,
            Self::AsyCompleted => CanonicalField::CompletedQty,
            Self::FtIncomingUntested => CanonicalField::IncomingQty,
            Self::FtWip => CanonicalField::WipQty,
            Self::FtFinishedInventory => CanonicalField::InventoryQty,
        }
    }

    /// Fields a row of this stage may carry. Anything else stays null so a row
    /// never mixes attributes of two stages.
    pub fn fields(&self) -> &'static [CanonicalField] {
        use CanonicalField as F;
        match self {
            Self::BpInProcess => &[
                F::Supplier, F::Stage, F::LotNo, F::WaferModel, F::DeviceName, F::WaferQty,
                F::Quantity,
            ],
            Self::BpCompleted => &[
                F::Supplier, F::Stage, F::WaferModel, F::DeviceName, F::LotNo, F::WarehouseInDate,
                F::GoodDieQty, F::Quantity,
            ],
            Self::AsyInProcess => &[
                F::Supplier, F::Stage, F::DeviceName, F::WaferModel, F::LotNo, F::AssemblyPo,
                F::StartTime, F::OrderQty, F::CurrentStage, F::CurrentStageQty, F::Quantity,
            ],
            Self::AsyCompleted => &[
                F::Supplier, F::Stage, F::CompletedQty, F::LotNo, F::DeviceName, F::WaferModel,
                F::DateCode, F::Quantity,
            ],
            Self::FtIncomingUntested => &[
                F::Supplier, F::Stage, F::DeviceName, F::WaferModel, F::LotNo, F::TestOrderNo,
                F::TestType, F::DateCode, F::Bin, F::IncomingQty, F::StatusCode, F::Quantity,
            ],
            Self::FtWip => &[
                F::Supplier, F::Stage, F::DeviceName, F::WaferModel, F::TestOrderNo, F::TestType,
                F::LotNo, F::DateCode, F::WipQty, F::Bin, F::StatusCode, F::Quantity,
            ],
            Self::FtFinishedInventory => &[
                F::Supplier, F::Stage, F::TestOrderNo, F::DeviceName, F::WaferModel, F::LotNo,
                F::TestType, F::DateCode, F::Bin, F::InventoryQty, F::StatusCode, F::Quantity,
            ],
        }
    }

    pub fn allows(&self, field: CanonicalField) -> bool {
        self.fields().contains(&field)
    }
}

impl fmt::Display for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Supplier {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Supplier::ALL
            .into_iter()
            .find(|supplier| supplier.label() == s)
            .ok_or_else(|| ParseLabelError {
                kind: "supplier",
                label: s.to_string(),
            })
    }
}

impl FromStr for Stage {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.label() == s)
            .ok_or_else(|| ParseLabelError {
                kind: "stage",
                label: s.to_string(),
            })
    }
}
