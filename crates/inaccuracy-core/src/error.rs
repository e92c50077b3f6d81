//! Engine error taxonomy.
//!
//! Absent measurements are not errors: a missing azimuth reading propagates as
//! `None` through the extractor, and a degenerate statistical input yields an
//! absent coefficient. The variants here cover the conditions that must reach
//! the caller: a missing or unreadable ledger, and store inconsistencies.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the ledger and correlation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ledger file does not exist. Reads and correlation requests against
    /// a never-written ledger are a not-found condition, not an empty result.
    #[error("inaccuracy ledger not found: {}", .0.display())]
    LedgerNotFound(PathBuf),

    /// The ledger file exists but holds no data rows.
    #[error("inaccuracy ledger has no data rows: {}", .0.display())]
    LedgerEmpty(PathBuf),

    /// A ledger line could not be parsed back into a row.
    #[error("malformed ledger row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// The store has no record with the given id.
    #[error("no measurement record with id {0}")]
    UnknownRecord(u64),

    /// Underlying file I/O failure.
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error maps to a not-found condition at the API boundary.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::LedgerNotFound(_) | Self::LedgerEmpty(_))
    }
}
