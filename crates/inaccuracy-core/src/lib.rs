//! Core engine for azimuth inaccuracy analysis.
//!
//! Turns raw equipment test reports into error statistics along a fixed
//! pipeline:
//!
//! 1. **Records** ([`record`]) — ingested test reports with up to six raw
//!    azimuth readings and environmental covariates, behind the
//!    [`MeasurementStore`] trait.
//! 2. **Extraction** ([`extract`]) — per-condition error values, half the
//!    spread of the relevant readings.
//! 3. **Ledger** ([`ledger`]) — the append-only fixed-width file holding one
//!    error row per processed record, plus the yearly normalized series
//!    rebuilt from it.
//! 4. **Correlation** ([`correlate`]) — Pearson statistics of the normalized
//!    errors against interval covariates and mean-per-category breakdowns for
//!    nominal ones.
//! 5. **Matrix** ([`matrix`]) — the fixed 3 × 5 condition-by-covariate grid
//!    with tagged fallback cells and the root-cause catalog.
//!
//! The ledger is the sole source of historical error truth: errors are
//! computed once, appended once, and every downstream statistic is rebuilt
//! from the ledger on demand.

pub mod correlate;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod matrix;
pub mod record;

pub use correlate::{
    CategoryMean, ConditionCorrelation, CorrelationStat, T_CRITICAL, compute_correlations, pearson,
    t_statistic,
};
pub use error::EngineError;
pub use extract::{condition_error, parse_test_year};
pub use ledger::{K_MAX, Ledger, LedgerRow, YearlyData, YearlySeries};
pub use matrix::{CorrelationMatrix, Covariate, MatrixCell, MatrixRow, Measure, Reason, build_matrix};
pub use record::{
    Covariates, MeasurementRecord, MeasurementStore, MemoryStore, TestCondition,
};

/// Engine version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
