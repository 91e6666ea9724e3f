//! Property tests for extraction coercion and filtering.

use proptest::prelude::*;

use chipline_models::{CanonicalRecord, CanonicalTable, Stage, Supplier};
use chipline_utils::ingest::extractor::extract_rows;
use chipline_utils::ingest::{Cell, CurrentStageResolver, FilterEngine, FilterSpec, Layouts, Sheet};

fn arb_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Empty),
        any::<f64>().prop_map(Cell::Number),
        ".{0,12}".prop_map(Cell::Text),
        "-?[0-9]{1,6}(\\.[0-9]{1,3})?".prop_map(Cell::Text),
        any::<bool>().prop_map(Cell::Bool),
        (0.0f64..80_000.0).prop_map(Cell::DateTime),
    ]
}

fn arb_record() -> impl Strategy<Value = CanonicalRecord> {
    let supplier_stage = prop::sample::select(Supplier::ALL.to_vec()).prop_flat_map(|supplier| {
        prop::sample::select(supplier.stages().to_vec()).prop_map(move |stage| (supplier, stage))
    });
    (
        supplier_stage,
        prop::option::of("L[0-4]"),
        prop::option::of("D[0-3]"),
        prop::option::of("S[0-3]"),
        prop::option::of(0.0f64..1_000.0),
    )
        .prop_map(|((supplier, stage), lot, device, current, qty)| {
            let mut record = CanonicalRecord::new(supplier, stage);
            record.lot_no = lot;
            record.device_name = device;
            if stage == Stage::AsyInProcess {
                record.current_stage = current;
                record.current_stage_qty = qty;
            }
            record.normalized(true)
        })
}

fn arb_spec() -> impl Strategy<Value = FilterSpec> {
    (
        prop::option::of(prop::sample::select(Supplier::ALL.to_vec())),
        prop::option::of(prop::sample::select(Stage::ALL.to_vec())),
        prop::collection::vec("L[0-4]", 0..3),
        prop::collection::vec("D[0-3]", 0..3),
        prop::collection::vec("S[0-3]", 0..2),
    )
        .prop_map(|(supplier, stage, lots, devices, current_stages)| FilterSpec {
            supplier,
            stage,
            lots,
            devices,
            current_stages,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Whatever sits in a quantity column, the extracted quantity is a finite
    /// number or null.
    #[test]
    fn prop_quantity_coercion_never_fails(cells in prop::collection::vec(arb_cell(), 1..20)) {
        let map = Layouts::default().bonding.in_process;
        let mut rows = vec![vec![Cell::Text("header".into()); 8]];
        for cell in &cells {
            let mut row = vec![Cell::Text("x".into()); 8];
            row[7] = cell.clone();
            rows.push(row);
        }
        let sheet = Sheet::new("wip", rows);

        let records = extract_rows(Supplier::BondingPartner, Stage::BpInProcess, &map, &sheet, true).unwrap();
        prop_assert_eq!(records.len(), cells.len());
        for record in &records {
            prop_assert!(record.quantity.map_or(true, f64::is_finite));
            prop_assert_eq!(record.quantity, record.wafer_qty);
        }
    }

    /// Resolution is a pure function of the row.
    #[test]
    fn prop_stage_resolution_is_deterministic(values in prop::collection::vec(arb_cell(), 10)) {
        let names: Vec<String> = (0..10).map(|i| format!("S{i}")).collect();
        let resolver = CurrentStageResolver::default();
        let first = resolver.resolve(&names, &values);
        let second = resolver.resolve(&names, &values);
        prop_assert_eq!(&first, &second);
        if first.stage.is_empty() {
            prop_assert_eq!(first.quantity, 0.0);
        } else {
            prop_assert!(first.quantity != 0.0);
        }
    }

    /// Filtering an already filtered table changes nothing.
    #[test]
    fn prop_filter_is_idempotent(
        records in prop::collection::vec(arb_record(), 0..40),
        spec in arb_spec(),
    ) {
        let engine = FilterEngine::default();
        let table = CanonicalTable::new(records);
        let once: Vec<CanonicalRecord> = engine.select(&table, &spec).into_iter().cloned().collect();
        let filtered = CanonicalTable::new(once.clone());
        let twice: Vec<CanonicalRecord> = engine.select(&filtered, &spec).into_iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }

    /// Projection always yields the target columns, even for zero rows.
    #[test]
    fn prop_projection_keeps_target_columns(
        records in prop::collection::vec(arb_record(), 0..20),
        spec in arb_spec(),
    ) {
        let engine = FilterEngine::default();
        let table = CanonicalTable::new(records);
        let result = engine.apply(&table, &spec);
        prop_assert_eq!(result.view.columns, engine.target_columns(&spec));
        for (idx, row) in result.view.rows.iter().enumerate() {
            prop_assert_eq!(row.sequence_no, idx + 1);
        }
    }
}
