//! Append-only error ledger.
//!
//! The ledger is the sole source of truth for historical error data: one row
//! per processed measurement record, appended once and never rewritten. The
//! raw store may be queried again for covariates but never for error
//! recomputation.
//!
//! # Storage format
//!
//! Plain text, one fixed-width row per line:
//!
//! ```text
//! Year    ProductNumber  ErrorNKU          ErrorMinus50      ErrorPlus50
//! 2023    1012           1.50              0.75              1.00
//! ```
//!
//! Column order is load-bearing (downstream tooling reads it positionally);
//! error cells are formatted to 2 decimal places; absent values are blank
//! cells. New rows append without touching prior content.
//!
//! All access — append and read — goes through a [`Ledger`] guard that owns a
//! mutex, so two concurrent calculate requests cannot interleave their
//! read-modify-write cycles, and reads only ever observe fully persisted rows.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::extract::{condition_error, parse_test_year};
use crate::record::{MeasurementRecord, MeasurementStore, TestCondition};

/// Maximum admissible error; the normalization denominator for error ratios.
pub const K_MAX: f64 = 3.0;

const COLUMN_WIDTHS: [usize; 5] = [8, 15, 18, 18, 18];
const HEADER_LABELS: [&str; 5] = [
    "Year",
    "ProductNumber",
    "ErrorNKU",
    "ErrorMinus50",
    "ErrorPlus50",
];

/// One persisted ledger row. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Test year, absent when the record's date string did not parse. Rows
    /// without a year are kept in the ledger but excluded from yearly
    /// aggregation.
    pub year: Option<i32>,
    pub product_number: i64,
    pub error_nku: Option<f64>,
    pub error_minus_50: Option<f64>,
    pub error_plus_50: Option<f64>,
}

impl LedgerRow {
    /// Compute a ledger row from an unprocessed record.
    pub fn from_record(record: &MeasurementRecord) -> Self {
        let year = record.test_date.as_deref().and_then(parse_test_year);
        if year.is_none() {
            log::warn!(
                "record {} (product {}): test date {:?} has no parseable year; \
                 row will be excluded from yearly grouping",
                record.id,
                record.product_number,
                record.test_date
            );
        }
        Self {
            year,
            product_number: record.product_number,
            error_nku: condition_error(record, TestCondition::Nku),
            error_minus_50: condition_error(record, TestCondition::Minus50),
            error_plus_50: condition_error(record, TestCondition::Plus50),
        }
    }

    /// Error value for one condition.
    pub fn error(&self, condition: TestCondition) -> Option<f64> {
        match condition {
            TestCondition::Nku => self.error_nku,
            TestCondition::Minus50 => self.error_minus_50,
            TestCondition::Plus50 => self.error_plus_50,
        }
    }
}

/// Per-condition sample counts for one year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyCounts {
    pub nku: usize,
    pub minus_50: usize,
    pub plus_50: usize,
}

/// Normalized error ratios for one year, per condition, in ledger order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearlyData {
    pub nku: Vec<f64>,
    pub minus_50: Vec<f64>,
    pub plus_50: Vec<f64>,
    pub count: YearlyCounts,
}

/// Year label → normalized series. Rebuilt from the ledger on every read.
pub type YearlySeries = BTreeMap<String, YearlyData>;

/// Guarded handle to the ledger file.
///
/// Owns the only mutex under which the backing file is opened, so callers
/// cannot race append-then-persist sequences against each other or against
/// reads.
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    /// Create a handle for a ledger file. The file itself is created lazily
    /// on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file has been created.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Compute and append error rows for every unprocessed record in the
    /// store, marking each record processed immediately after its row is
    /// durably appended. Returns the number of records processed.
    ///
    /// Idempotent: a second invocation against an unchanged store appends
    /// nothing and returns 0. A store with no unprocessed records is success
    /// with a zero count, never an error.
    pub fn write_new_errors(&self, store: &dyn MeasurementStore) -> Result<usize, EngineError> {
        let _guard = self.lock.lock().unwrap();

        let pending = store.list_unprocessed();
        if pending.is_empty() {
            return Ok(0);
        }

        let fresh = !self.path.exists();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        if fresh {
            writeln!(out, "{}", header_line())?;
        }

        let mut added = 0;
        for record in &pending {
            let row = LedgerRow::from_record(record);
            writeln!(out, "{}", format_row(&row))?;
            // The row must be durable before the flag flips; flushing per
            // record bounds any crash window to a single record.
            out.flush()?;
            store.mark_processed(record.id)?;
            added += 1;
        }

        log::info!("ledger {}: appended {} new rows", self.path.display(), added);
        Ok(added)
    }

    /// Read back every persisted row. The ledger file being absent is a
    /// not-found condition.
    pub fn read_rows(&self) -> Result<Vec<LedgerRow>, EngineError> {
        let _guard = self.lock.lock().unwrap();
        self.read_rows_locked()
    }

    fn read_rows_locked(&self) -> Result<Vec<LedgerRow>, EngineError> {
        if !self.path.exists() {
            return Err(EngineError::LedgerNotFound(self.path.clone()));
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let mut rows = Vec::new();
        for (index, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            rows.push(parse_row(line, index + 1)?);
        }
        Ok(rows)
    }

    /// Raw text of the ledger file, for download/display.
    pub fn raw_contents(&self) -> Result<String, EngineError> {
        let _guard = self.lock.lock().unwrap();
        if !self.path.exists() {
            return Err(EngineError::LedgerNotFound(self.path.clone()));
        }
        Ok(std::fs::read_to_string(&self.path)?)
    }

    /// Rebuild the per-year normalized series from the ledger.
    ///
    /// Each present error value is divided by [`K_MAX`]; ratios that are NaN
    /// are dropped from their series (neither counted nor retained). Rows
    /// without a year are skipped. Year labels carry no ordering guarantee.
    pub fn read_yearly_series(&self) -> Result<YearlySeries, EngineError> {
        let rows = self.read_rows()?;
        let mut series = YearlySeries::new();

        for row in &rows {
            let Some(year) = row.year else {
                log::debug!(
                    "ledger row for product {} has no year; skipped in yearly series",
                    row.product_number
                );
                continue;
            };
            let data = series.entry(year.to_string()).or_default();
            for condition in TestCondition::ALL {
                let Some(error) = row.error(condition) else {
                    continue;
                };
                let ratio = error / K_MAX;
                if ratio.is_nan() {
                    log::debug!(
                        "dropping NaN ratio for product {} ({condition})",
                        row.product_number
                    );
                    continue;
                }
                match condition {
                    TestCondition::Nku => {
                        data.nku.push(ratio);
                        data.count.nku += 1;
                    }
                    TestCondition::Minus50 => {
                        data.minus_50.push(ratio);
                        data.count.minus_50 += 1;
                    }
                    TestCondition::Plus50 => {
                        data.plus_50.push(ratio);
                        data.count.plus_50 += 1;
                    }
                }
            }
        }
        Ok(series)
    }

    #[cfg(test)]
    pub(crate) fn append_rows_for_test(&self, rows: &[LedgerRow]) -> Result<(), EngineError> {
        let _guard = self.lock.lock().unwrap();
        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        if fresh {
            writeln!(out, "{}", header_line())?;
        }
        for row in rows {
            writeln!(out, "{}", format_row(row))?;
        }
        out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row formatting / parsing
// ---------------------------------------------------------------------------

fn pad(cell: &str, width: usize) -> String {
    format!("{cell:<width$}")
}

fn header_line() -> String {
    HEADER_LABELS
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(label, width)| pad(label, width))
        .collect()
}

fn format_row(row: &LedgerRow) -> String {
    let year = row.year.map(|y| y.to_string()).unwrap_or_default();
    let error_cell = |e: Option<f64>| e.map(|v| format!("{v:.2}")).unwrap_or_default();

    [
        pad(&year, COLUMN_WIDTHS[0]),
        pad(&row.product_number.to_string(), COLUMN_WIDTHS[1]),
        pad(&error_cell(row.error_nku), COLUMN_WIDTHS[2]),
        pad(&error_cell(row.error_minus_50), COLUMN_WIDTHS[3]),
        pad(&error_cell(row.error_plus_50), COLUMN_WIDTHS[4]),
    ]
    .concat()
}

fn parse_row(line: &str, line_number: usize) -> Result<LedgerRow, EngineError> {
    let mut cells = [""; 5];
    let mut start = 0;
    for (i, width) in COLUMN_WIDTHS.into_iter().enumerate() {
        let end = (start + width).min(line.len());
        cells[i] = line.get(start..end).unwrap_or("").trim();
        start = end;
    }

    let malformed = |reason: String| EngineError::MalformedRow {
        line: line_number,
        reason,
    };

    let year = if cells[0].is_empty() {
        None
    } else {
        Some(
            cells[0]
                .parse::<i32>()
                .map_err(|e| malformed(format!("bad year {:?}: {e}", cells[0])))?,
        )
    };
    let product_number = cells[1]
        .parse::<i64>()
        .map_err(|e| malformed(format!("bad product number {:?}: {e}", cells[1])))?;

    let mut errors = [None; 3];
    for (slot, cell) in errors.iter_mut().zip(&cells[2..]) {
        if !cell.is_empty() {
            *slot = Some(
                cell.parse::<f64>()
                    .map_err(|e| malformed(format!("bad error value {cell:?}: {e}")))?,
            );
        }
    }

    Ok(LedgerRow {
        year,
        product_number,
        error_nku: errors[0],
        error_minus_50: errors[1],
        error_plus_50: errors[2],
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryStore;
    use crate::record::test_support::full_record;

    /// Record whose three condition errors all equal `error`.
    fn record_with_error(product_number: i64, date: &str, error: f64) -> MeasurementRecord {
        let mut record = full_record(product_number, date);
        record.azimuth_nku = Some(0.0);
        record.repeated_azimuth_nku = Some(2.0 * error);
        record.azimuth_minus_50 = Some(0.0);
        record.repeated_azimuth_minus_50 = Some(0.0);
        record.azimuth_plus_50 = Some(0.0);
        record.repeated_azimuth_plus_50 = Some(0.0);
        record
    }

    fn temp_ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("inaccuracytest.txt"));
        (dir, ledger)
    }

    // -----------------------------------------------------------------------
    // Format tests
    // -----------------------------------------------------------------------

    #[test]
    fn header_has_fixed_column_offsets() {
        let header = header_line();
        assert!(header.starts_with("Year"));
        assert_eq!(&header[8..21], "ProductNumber");
        assert_eq!(&header[23..31], "ErrorNKU");
        assert_eq!(header.len(), COLUMN_WIDTHS.iter().sum::<usize>());
    }

    #[test]
    fn row_round_trip() {
        let row = LedgerRow {
            year: Some(2023),
            product_number: 1012,
            error_nku: Some(1.5),
            error_minus_50: None,
            error_plus_50: Some(0.75),
        };
        let line = format_row(&row);
        let parsed = parse_row(&line, 2).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn row_formats_two_decimal_places() {
        let row = LedgerRow {
            year: Some(2023),
            product_number: 7,
            error_nku: Some(1.0 / 3.0),
            error_minus_50: Some(2.0),
            error_plus_50: None,
        };
        let line = format_row(&row);
        assert!(line.contains("0.33"));
        assert!(line.contains("2.00"));
    }

    #[test]
    fn yearless_row_round_trip() {
        let row = LedgerRow {
            year: None,
            product_number: 3,
            error_nku: None,
            error_minus_50: None,
            error_plus_50: None,
        };
        let parsed = parse_row(&format_row(&row), 5).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn parse_rejects_bad_product_number() {
        let line = format!("{}{}", pad("2023", 8), pad("not-a-number", 15));
        let err = parse_row(&line, 3).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRow { line: 3, .. }));
    }

    // -----------------------------------------------------------------------
    // Writer tests
    // -----------------------------------------------------------------------

    #[test]
    fn write_appends_rows_and_marks_processed() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        store.insert(record_with_error(1, "01.02.2023", 1.5));
        store.insert(record_with_error(2, "01.02.2023", 3.0));

        let added = ledger.write_new_errors(&store).unwrap();
        assert_eq!(added, 2);
        assert!(store.list_unprocessed().is_empty());

        let rows = ledger.read_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].error_nku, Some(1.5));
        assert_eq!(rows[1].error_nku, Some(3.0));
    }

    #[test]
    fn write_is_idempotent() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        store.insert(record_with_error(1, "01.02.2023", 1.0));

        assert_eq!(ledger.write_new_errors(&store).unwrap(), 1);
        assert_eq!(ledger.write_new_errors(&store).unwrap(), 0);
        assert_eq!(ledger.read_rows().unwrap().len(), 1);
    }

    #[test]
    fn write_empty_store_is_zero_not_error() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        assert_eq!(ledger.write_new_errors(&store).unwrap(), 0);
        // Nothing to write: the file is not even created.
        assert!(!ledger.exists());
    }

    #[test]
    fn second_write_appends_without_rewriting() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        store.insert(record_with_error(1, "01.02.2023", 1.0));
        ledger.write_new_errors(&store).unwrap();
        let first_pass = ledger.raw_contents().unwrap();

        store.insert(record_with_error(2, "01.02.2024", 2.0));
        ledger.write_new_errors(&store).unwrap();
        let second_pass = ledger.raw_contents().unwrap();

        assert!(second_pass.starts_with(&first_pass));
        assert_eq!(second_pass.lines().count(), 3); // header + 2 rows
        assert_eq!(
            second_pass.lines().count(),
            first_pass.lines().count() + 1
        );
    }

    #[test]
    fn write_preserves_missing_errors_as_blank() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        let mut record = record_with_error(1, "01.02.2023", 1.0);
        record.azimuth_plus_50 = None; // kills plus_50 and nku errors
        store.insert(record);

        ledger.write_new_errors(&store).unwrap();
        let rows = ledger.read_rows().unwrap();
        assert_eq!(rows[0].error_nku, None);
        assert_eq!(rows[0].error_plus_50, None);
        assert!(rows[0].error_minus_50.is_some());
    }

    // -----------------------------------------------------------------------
    // Reader tests
    // -----------------------------------------------------------------------

    #[test]
    fn read_missing_ledger_is_not_found() {
        let (_dir, ledger) = temp_ledger();
        let err = ledger.read_rows().unwrap_err();
        assert!(matches!(err, EngineError::LedgerNotFound(_)));
        let err = ledger.read_yearly_series().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn normalization_is_linear_in_k_max() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        store.insert(record_with_error(1, "01.02.2023", 6.0));
        ledger.write_new_errors(&store).unwrap();

        let series = ledger.read_yearly_series().unwrap();
        assert_eq!(series["2023"].nku, vec![2.0]);
    }

    #[test]
    fn yearly_series_groups_and_counts() {
        let (_dir, ledger) = temp_ledger();
        let store = MemoryStore::new();
        for error in [3.0, 6.0, 9.0] {
            store.insert(record_with_error(1, "15.03.2023", error));
        }
        store.insert(record_with_error(2, "20.04.2024", 0.0));
        ledger.write_new_errors(&store).unwrap();

        let series = ledger.read_yearly_series().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["2023"].nku, vec![1.0, 2.0, 3.0]);
        assert_eq!(series["2023"].count.nku, 3);
        assert_eq!(series["2024"].nku, vec![0.0]);
        assert_eq!(series["2024"].count.nku, 1);
    }

    #[test]
    fn yearless_rows_excluded_from_series() {
        let (_dir, ledger) = temp_ledger();
        ledger
            .append_rows_for_test(&[
                LedgerRow {
                    year: None,
                    product_number: 1,
                    error_nku: Some(3.0),
                    error_minus_50: None,
                    error_plus_50: None,
                },
                LedgerRow {
                    year: Some(2023),
                    product_number: 2,
                    error_nku: Some(3.0),
                    error_minus_50: None,
                    error_plus_50: None,
                },
            ])
            .unwrap();

        let series = ledger.read_yearly_series().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series["2023"].count.nku, 1);
    }

    #[test]
    fn nan_ratios_are_dropped() {
        let (_dir, ledger) = temp_ledger();
        ledger
            .append_rows_for_test(&[LedgerRow {
                year: Some(2023),
                product_number: 1,
                error_nku: Some(f64::NAN),
                error_minus_50: Some(1.5),
                error_plus_50: None,
            }])
            .unwrap();

        let series = ledger.read_yearly_series().unwrap();
        assert!(series["2023"].nku.is_empty());
        assert_eq!(series["2023"].count.nku, 0);
        assert_eq!(series["2023"].minus_50, vec![0.5]);
    }

    #[test]
    fn row_from_record_extracts_year_and_errors() {
        let record = record_with_error(9, "12.05.2023", 2.5);
        let row = LedgerRow::from_record(&record);
        assert_eq!(row.year, Some(2023));
        assert_eq!(row.product_number, 9);
        assert_eq!(row.error_nku, Some(2.5));
        assert_eq!(row.error_minus_50, Some(2.5));
        assert_eq!(row.error_plus_50, Some(2.5));
    }

    #[test]
    fn row_from_record_with_bad_date_has_no_year() {
        let mut record = record_with_error(9, "someday", 2.5);
        let row = LedgerRow::from_record(&record);
        assert_eq!(row.year, None);

        record.test_date = None;
        let row = LedgerRow::from_record(&record);
        assert_eq!(row.year, None);
    }
}
