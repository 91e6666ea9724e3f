//! Canonical production-status rows.
//!
//! Every supplier layout is normalized into [`CanonicalRecord`]. The record
//! always carries the full canonical field set; fields a source does not
//! provide are `None`, never missing, so tables built from different suppliers
//! concatenate without realignment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::supplier::{Stage, Supplier};

/// Name of a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Supplier,
    Stage,
    LotNo,
    WaferModel,
    WaferQty,
    WarehouseInDate,
    GoodDieQty,
    DeviceName,
    AssemblyPo,
    StartTime,
    OrderQty,
    CurrentStage,
    CurrentStageQty,
    CompletedQty,
    DateCode,
    TestOrderNo,
    TestType,
    Bin,
    IncomingQty,
    WipQty,
    InventoryQty,
    StatusCode,
    Quantity,
}

/// How a field's source cell is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Tag,
    Text,
    Quantity,
}

impl CanonicalField {
    /// The full canonical column set, in display order.
    pub const ALL: [CanonicalField; 23] = [
        CanonicalField::Supplier,
        CanonicalField::Stage,
        CanonicalField::LotNo,
        CanonicalField::WaferModel,
        CanonicalField::WaferQty,
        CanonicalField::WarehouseInDate,
        CanonicalField::GoodDieQty,
        CanonicalField::DeviceName,
        CanonicalField::AssemblyPo,
        CanonicalField::StartTime,
        CanonicalField::OrderQty,
        CanonicalField::CurrentStage,
        CanonicalField::CurrentStageQty,
        CanonicalField::CompletedQty,
        CanonicalField::DateCode,
        CanonicalField::TestOrderNo,
        CanonicalField::TestType,
        CanonicalField::Bin,
        CanonicalField::IncomingQty,
        CanonicalField::WipQty,
        CanonicalField::InventoryQty,
        CanonicalField::StatusCode,
        CanonicalField::Quantity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Supplier => "supplier",
            Self::Stage => "stage",
            Self::LotNo => "lot_no",
            Self::WaferModel => "wafer_model",
            Self::WaferQty => "wafer_qty",
            Self::WarehouseInDate => "warehouse_in_date",
            Self::GoodDieQty => "good_die_qty",
            Self::DeviceName => "device_name",
            Self::AssemblyPo => "assembly_po",
            Self::StartTime => "start_time",
            Self::OrderQty => "order_qty",
            Self::CurrentStage => "current_stage",
            Self::CurrentStageQty => "current_stage_qty",
            Self::CompletedQty => "completed_qty",
            Self::DateCode => "date_code",
            Self::TestOrderNo => "test_order_no",
            Self::TestType => "test_type",
            Self::Bin => "bin",
            Self::IncomingQty => "incoming_qty",
            Self::WipQty => "wip_qty",
            Self::InventoryQty => "inventory_qty",
            Self::StatusCode => "status_code",
            Self::Quantity => "quantity",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Supplier | Self::Stage => FieldKind::Tag,
            Self::WaferQty
            | Self::GoodDieQty
            | Self::OrderQty
            | Self::CurrentStageQty
            | Self::CompletedQty
            | Self::IncomingQty
            | Self::WipQty
            | Self::InventoryQty
            | Self::Quantity => FieldKind::Quantity,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell of the canonical table as seen by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::Number).unwrap_or(Value::Null)
    }
}

/// One (lot, stage) observation reported by one supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub supplier: Supplier,
    pub stage: Stage,
    pub lot_no: Option<String>,
    pub wafer_model: Option<String>,
    pub wafer_qty: Option<f64>,
    pub warehouse_in_date: Option<String>,
    pub good_die_qty: Option<f64>,
    pub device_name: Option<String>,
    pub assembly_po: Option<String>,
    pub start_time: Option<String>,
    pub order_qty: Option<f64>,
    pub current_stage: Option<String>,
    pub current_stage_qty: Option<f64>,
    pub completed_qty: Option<f64>,
    pub date_code: Option<String>,
    pub test_order_no: Option<String>,
    pub test_type: Option<String>,
    pub bin: Option<String>,
    pub incoming_qty: Option<f64>,
    pub wip_qty: Option<f64>,
    pub inventory_qty: Option<f64>,
    pub status_code: Option<String>,
    pub quantity: Option<f64>,
    /// Set only on rows standing in for a supplier that produced nothing.
    #[serde(skip)]
    placeholder: bool,
}

impl CanonicalRecord {
    /// A row with only `supplier` and `stage` populated.
    pub fn new(supplier: Supplier, stage: Stage) -> Self {
        Self {
            supplier,
            stage,
            lot_no: None,
            wafer_model: None,
            wafer_qty: None,
            warehouse_in_date: None,
            good_die_qty: None,
            device_name: None,
            assembly_po: None,
            start_time: None,
            order_qty: None,
            current_stage: None,
            current_stage_qty: None,
            completed_qty: None,
            date_code: None,
            test_order_no: None,
            test_type: None,
            bin: None,
            incoming_qty: None,
            wip_qty: None,
            inventory_qty: None,
            status_code: None,
            quantity: None,
            placeholder: false,
        }
    }

    /// The all-null row emitted for a supplier stage with no data.
    pub fn placeholder(supplier: Supplier, stage: Stage) -> Self {
        Self {
            placeholder: true,
            ..Self::new(supplier, stage)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn get(&self, field: CanonicalField) -> Value {
        match field {
            CanonicalField::Supplier => Value::Text(self.supplier.label().to_string()),
            CanonicalField::Stage => Value::Text(self.stage.label().to_string()),
            CanonicalField::LotNo => self.lot_no.clone().into(),
            CanonicalField::WaferModel => self.wafer_model.clone().into(),
            CanonicalField::WaferQty => self.wafer_qty.into(),
            CanonicalField::WarehouseInDate => self.warehouse_in_date.clone().into(),
            CanonicalField::GoodDieQty => self.good_die_qty.into(),
            CanonicalField::DeviceName => self.device_name.clone().into(),
            CanonicalField::AssemblyPo => self.assembly_po.clone().into(),
            CanonicalField::StartTime => self.start_time.clone().into(),
            CanonicalField::OrderQty => self.order_qty.into(),
            CanonicalField::CurrentStage => self.current_stage.clone().into(),
            CanonicalField::CurrentStageQty => self.current_stage_qty.into(),
            CanonicalField::CompletedQty => self.completed_qty.into(),
            CanonicalField::DateCode => self.date_code.clone().into(),
            CanonicalField::TestOrderNo => self.test_order_no.clone().into(),
            CanonicalField::TestType => self.test_type.clone().into(),
            CanonicalField::Bin => self.bin.clone().into(),
            CanonicalField::IncomingQty => self.incoming_qty.into(),
            CanonicalField::WipQty => self.wip_qty.into(),
            CanonicalField::InventoryQty => self.inventory_qty.into(),
            CanonicalField::StatusCode => self.status_code.clone().into(),
            CanonicalField::Quantity => self.quantity.into(),
        }
    }

    /// Stores a text value. Returns `false` (and stores nothing) when the field
    /// is not a text field of this row's stage.
    pub fn set_text(&mut self, field: CanonicalField, value: Option<String>) -> bool {
        if field.kind() != FieldKind::Text || !self.stage.allows(field) {
            return false;
        }
        let slot = match field {
            CanonicalField::LotNo => &mut self.lot_no,
            CanonicalField::WaferModel => &mut self.wafer_model,
            CanonicalField::WarehouseInDate => &mut self.warehouse_in_date,
            CanonicalField::DeviceName => &mut self.device_name,
            CanonicalField::AssemblyPo => &mut self.assembly_po,
            CanonicalField::StartTime => &mut self.start_time,
            CanonicalField::CurrentStage => &mut self.current_stage,
            CanonicalField::DateCode => &mut self.date_code,
            CanonicalField::TestOrderNo => &mut self.test_order_no,
            CanonicalField::TestType => &mut self.test_type,
            CanonicalField::Bin => &mut self.bin,
            CanonicalField::StatusCode => &mut self.status_code,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Stores a quantity. Same contract as [`CanonicalRecord::set_text`].
    pub fn set_quantity(&mut self, field: CanonicalField, value: Option<f64>) -> bool {
        if field.kind() != FieldKind::Quantity || !self.stage.allows(field) {
            return false;
        }
        let slot = match field {
            CanonicalField::WaferQty => &mut self.wafer_qty,
            CanonicalField::GoodDieQty => &mut self.good_die_qty,
            CanonicalField::OrderQty => &mut self.order_qty,
            CanonicalField::CurrentStageQty => &mut self.current_stage_qty,
            CanonicalField::CompletedQty => &mut self.completed_qty,
            CanonicalField::IncomingQty => &mut self.incoming_qty,
            CanonicalField::WipQty => &mut self.wip_qty,
            CanonicalField::InventoryQty => &mut self.inventory_qty,
            CanonicalField::Quantity => &mut self.quantity,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Final normalization applied to every extracted row: optional
    /// device/wafer back-fill, then derivation of `quantity` from the stage's
    /// named quantity field.
    pub fn normalized(mut self, backfill_device_aliases: bool) -> Self {
        if backfill_device_aliases {
            match (&self.device_name, &self.wafer_model) {
                (None, Some(wafer)) => self.device_name = Some(wafer.clone()),
                (Some(device), None) => self.wafer_model = Some(device.clone()),
                _ => {}
            }
        }
        self.quantity = self.get(self.stage.quantity_field()).as_number();
        self
    }

    /// Device identifiers for device filtering: the device name and, when it
    /// differs, the wafer model.
    pub fn device_keys(&self) -> impl Iterator<Item = &str> {
        let wafer = match (&self.device_name, &self.wafer_model) {
            (Some(device), Some(wafer)) if device == wafer => None,
            (_, wafer) => wafer.as_deref(),
        };
        self.device_name.as_deref().into_iter().chain(wafer)
    }
}

/// The pipeline's output: every extracted row plus the declared column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub columns: Vec<CanonicalField>,
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self {
            columns: CanonicalField::ALL.to_vec(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_supplier(&self, supplier: Supplier) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.iter().filter(move |r| r.supplier == supplier)
    }
}

impl Default for CanonicalTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
