//! Measurement records and the store interface.
//!
//! A [`MeasurementRecord`] is one ingested equipment test report: up to six
//! raw azimuth readings (exact and repeated, at three temperature conditions),
//! environmental covariates, and a `processed` flag that flips exactly once
//! when the record's error values are appended to the ledger.
//!
//! The engine consumes records through the [`MeasurementStore`] trait; the
//! bundled [`MemoryStore`] is a thread-safe in-memory implementation used by
//! the server and CLI.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Temperature condition of an azimuth test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCondition {
    /// Ambient/normal conditions (NKU).
    #[default]
    Nku,
    /// −50 °C chamber test.
    Minus50,
    /// +50 °C chamber test.
    Plus50,
}

impl TestCondition {
    /// All conditions in ledger column order.
    pub const ALL: [TestCondition; 3] = [Self::Nku, Self::Minus50, Self::Plus50];
}

impl std::fmt::Display for TestCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nku => write!(f, "nku"),
            Self::Minus50 => write!(f, "minus_50"),
            Self::Plus50 => write!(f, "plus_50"),
        }
    }
}

/// One ingested test report with raw azimuth readings and covariates.
///
/// Every azimuth field may be absent (no measurement taken). The product
/// number is not guaranteed unique across years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Store-assigned identity.
    #[serde(default)]
    pub id: u64,
    /// Product/system number from the report.
    pub product_number: i64,
    /// Raw test-date string as extracted from the report (e.g. `12.05.2023`).
    pub test_date: Option<String>,

    pub azimuth_nku: Option<f64>,
    pub repeated_azimuth_nku: Option<f64>,
    pub azimuth_minus_50: Option<f64>,
    pub repeated_azimuth_minus_50: Option<f64>,
    pub azimuth_plus_50: Option<f64>,
    pub repeated_azimuth_plus_50: Option<f64>,

    /// Relative humidity during the test, percent.
    pub humidity: Option<f64>,
    /// Vibration level during the test, dB.
    pub vibration_level: Option<f64>,
    /// Product type designation.
    pub product_type: Option<String>,
    /// Production unit / department that built the product.
    pub production_unit: Option<String>,

    /// True once the record's errors have been appended to the ledger.
    #[serde(default)]
    pub processed: bool,
}

impl MeasurementRecord {
    /// Exact and repeated readings for one condition, if both are present.
    pub fn reading_pair(&self, condition: TestCondition) -> Option<(f64, f64)> {
        match condition {
            TestCondition::Nku => Some((self.azimuth_nku?, self.repeated_azimuth_nku?)),
            TestCondition::Minus50 => {
                Some((self.azimuth_minus_50?, self.repeated_azimuth_minus_50?))
            }
            TestCondition::Plus50 => Some((self.azimuth_plus_50?, self.repeated_azimuth_plus_50?)),
        }
    }

    /// Environmental/production covariates of this record.
    pub fn covariates(&self) -> Covariates {
        Covariates {
            humidity: self.humidity,
            vibration_level: self.vibration_level,
            product_type: self.product_type.clone(),
            production_unit: self.production_unit.clone(),
        }
    }
}

/// Covariates recovered from the store when joining ledger rows back by
/// product number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    pub humidity: Option<f64>,
    pub vibration_level: Option<f64>,
    pub product_type: Option<String>,
    pub production_unit: Option<String>,
}

/// Interface the engine consumes from the measurement store.
pub trait MeasurementStore: Send + Sync {
    /// Records whose errors have not yet been written to the ledger.
    fn list_unprocessed(&self) -> Vec<MeasurementRecord>;

    /// Flip a record's processed flag. Called once per record, immediately
    /// after its ledger row is durably appended.
    fn mark_processed(&self, id: u64) -> Result<(), EngineError>;

    /// Covariates of the first record matching a product number.
    fn covariates_by_product_number(&self, number: i64) -> Option<Covariates>;

    /// All `(product_number, covariates)` pairs, first occurrence per number
    /// in ingestion order.
    fn list_all_with_covariates(&self) -> Vec<(i64, Covariates)>;
}

/// Thread-safe in-memory measurement store.
pub struct MemoryStore {
    records: Mutex<Vec<MeasurementRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Create a store from previously saved records, keeping their ids and
    /// processed flags.
    pub fn from_records(records: Vec<MeasurementRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Insert a record, assigning the next free id. Returns the id.
    pub fn insert(&self, mut record: MeasurementRecord) -> u64 {
        let mut records = self.records.lock().unwrap();
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        record.id = id;
        record.processed = false;
        records.push(record);
        id
    }

    /// Snapshot of every record.
    pub fn records(&self) -> Vec<MeasurementRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementStore for MemoryStore {
    fn list_unprocessed(&self) -> Vec<MeasurementRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.processed)
            .cloned()
            .collect()
    }

    fn mark_processed(&self, id: u64) -> Result<(), EngineError> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.processed = true;
                Ok(())
            }
            None => Err(EngineError::UnknownRecord(id)),
        }
    }

    fn covariates_by_product_number(&self, number: i64) -> Option<Covariates> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.product_number == number)
            .map(MeasurementRecord::covariates)
    }

    fn list_all_with_covariates(&self) -> Vec<(i64, Covariates)> {
        let records = self.records.lock().unwrap();
        let mut seen: Vec<i64> = Vec::new();
        let mut out = Vec::new();
        for record in records.iter() {
            if seen.contains(&record.product_number) {
                continue;
            }
            seen.push(record.product_number);
            out.push((record.product_number, record.covariates()));
        }
        out
    }
}
