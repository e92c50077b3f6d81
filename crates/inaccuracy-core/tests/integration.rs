//! End-to-end pipeline tests: ingest records, write the ledger, then rebuild
//! every downstream statistic from it.

use inaccuracy_core::{
    EngineError, K_MAX, Ledger, MeasurementRecord, MeasurementStore, MemoryStore, TestCondition,
    build_matrix, compute_correlations,
};

fn report(product_number: i64, date: &str, nku_spread: f64) -> MeasurementRecord {
    MeasurementRecord {
        id: 0,
        product_number,
        test_date: Some(date.to_string()),
        azimuth_nku: Some(100.0),
        repeated_azimuth_nku: Some(100.0 + nku_spread),
        azimuth_minus_50: Some(100.0),
        repeated_azimuth_minus_50: Some(100.0),
        azimuth_plus_50: Some(100.0),
        repeated_azimuth_plus_50: Some(100.0),
        humidity: Some(40.0 + nku_spread * 10.0),
        vibration_level: Some(10.0),
        product_type: Some("A-1".to_string()),
        production_unit: Some("unit-7".to_string()),
        processed: false,
    }
}

#[test]
fn full_pipeline_from_reports_to_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
    let store = MemoryStore::new();

    store.insert(report(1, "10.01.2021", 0.6));
    store.insert(report(2, "11.02.2022", 1.2));
    store.insert(report(3, "12.03.2023", 1.8));
    store.insert(report(4, "13.04.2024", 2.4));

    // Calculate pass: every pending record lands in the ledger exactly once.
    assert_eq!(ledger.write_new_errors(&store).unwrap(), 4);
    assert_eq!(ledger.write_new_errors(&store).unwrap(), 0);
    assert!(store.list_unprocessed().is_empty());

    // Yearly series is rebuilt from the ledger, normalized by K_MAX.
    let series = ledger.read_yearly_series().unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(series["2021"].nku, vec![0.3 / K_MAX]);
    assert_eq!(series["2024"].count.nku, 1);

    // Correlations join ledger rows back to the store's covariates. Humidity
    // tracks the error exactly by construction.
    let correlations = compute_correlations(&ledger, &store).unwrap();
    assert_eq!(correlations.len(), 3);
    let nku = &correlations[0];
    assert_eq!(nku.condition, TestCondition::Nku);
    assert_eq!(nku.points, 4);
    assert!(nku.humidity.r.unwrap() > 0.99);
    assert!(nku.year.r.unwrap() > 0.99);
    assert_eq!(nku.by_product_type.len(), 1);
    assert_eq!(nku.by_product_type[0].count, 4);

    // The matrix reuses the same joined data; humidity and year cells are
    // real, the single-category nominal columns fall back, tagged.
    let matrix = build_matrix(&ledger, &store).unwrap();
    assert_eq!(matrix.rows.len(), 3);
    let nku_row = &matrix.rows[0];
    assert!(nku_row.cells[0].computed); // year
    assert!(nku_row.cells[1].computed); // humidity
    assert!(!nku_row.cells[3].computed); // product type: one category
    assert!(!matrix.reasons.is_empty());
}

#[test]
fn analysis_before_any_calculation_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
    let store = MemoryStore::new();
    store.insert(report(1, "10.01.2023", 1.0));

    // No calculate pass has run; every read-side operation reports not-found
    // rather than fabricating an empty result.
    assert!(ledger.read_yearly_series().unwrap_err().is_not_found());
    assert!(compute_correlations(&ledger, &store).unwrap_err().is_not_found());
    assert!(build_matrix(&ledger, &store).unwrap_err().is_not_found());
    assert!(ledger.raw_contents().unwrap_err().is_not_found());
}

#[test]
fn later_ingest_appends_to_existing_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
    let store = MemoryStore::new();

    store.insert(report(1, "10.01.2023", 1.0));
    ledger.write_new_errors(&store).unwrap();
    let first = ledger.raw_contents().unwrap();

    store.insert(report(2, "10.01.2024", 2.0));
    assert_eq!(ledger.write_new_errors(&store).unwrap(), 1);
    let second = ledger.raw_contents().unwrap();

    // Append-only: earlier content survives byte for byte.
    assert!(second.starts_with(&first));
    assert_eq!(ledger.read_rows().unwrap().len(), 2);
}

#[test]
fn incomplete_report_persists_with_blank_cells() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
    let store = MemoryStore::new();

    let mut record = report(1, "10.01.2023", 1.0);
    record.azimuth_minus_50 = None;
    store.insert(record);

    assert_eq!(ledger.write_new_errors(&store).unwrap(), 1);
    let rows = ledger.read_rows().unwrap();
    // −50 needs its own pair; NKU needs all six. +50 still computes.
    assert_eq!(rows[0].error_minus_50, None);
    assert_eq!(rows[0].error_nku, None);
    assert!(rows[0].error_plus_50.is_some());

    let series = ledger.read_yearly_series().unwrap();
    assert_eq!(series["2023"].count.minus_50, 0);
    assert_eq!(series["2023"].count.plus_50, 1);
}

#[test]
fn marking_failure_surfaces_as_engine_error() {
    struct BrokenStore(MemoryStore);

    impl MeasurementStore for BrokenStore {
        fn list_unprocessed(&self) -> Vec<MeasurementRecord> {
            self.0.list_unprocessed()
        }
        fn mark_processed(&self, _id: u64) -> Result<(), EngineError> {
            Err(EngineError::UnknownRecord(999))
        }
        fn covariates_by_product_number(
            &self,
            number: i64,
        ) -> Option<inaccuracy_core::Covariates> {
            self.0.covariates_by_product_number(number)
        }
        fn list_all_with_covariates(&self) -> Vec<(i64, inaccuracy_core::Covariates)> {
            self.0.list_all_with_covariates()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
    let store = BrokenStore(MemoryStore::new());
    store.0.insert(report(1, "10.01.2023", 1.0));

    let err = ledger.write_new_errors(&store).unwrap_err();
    assert!(matches!(err, EngineError::UnknownRecord(999)));
}
