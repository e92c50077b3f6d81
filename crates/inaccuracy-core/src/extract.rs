//! Per-test error extraction from raw azimuth readings.
//!
//! The error for a condition is half the spread, `(max − min) / 2`, over the
//! readings relevant to that condition:
//!
//! - **−50 / +50**: the exact and repeated readings at that temperature plus
//!   the exact and repeated ambient (NKU) readings — extreme-temperature error
//!   is drift relative to the ambient baseline, not test-retest spread alone.
//! - **NKU**: all six readings, the widest possible spread.
//!
//! Any required reading being absent makes the result absent. No partial
//! spreads, no zero substitution.

use crate::record::{MeasurementRecord, TestCondition};

/// Error value for one condition of a record, or `None` if any required
/// reading is missing.
pub fn condition_error(record: &MeasurementRecord, condition: TestCondition) -> Option<f64> {
    let (exact, repeated) = record.reading_pair(condition)?;
    let (nku_exact, nku_repeated) = record.reading_pair(TestCondition::Nku)?;

    let readings: Vec<f64> = match condition {
        TestCondition::Nku => {
            let (m_exact, m_repeated) = record.reading_pair(TestCondition::Minus50)?;
            let (p_exact, p_repeated) = record.reading_pair(TestCondition::Plus50)?;
            vec![exact, repeated, m_exact, m_repeated, p_exact, p_repeated]
        }
        TestCondition::Minus50 | TestCondition::Plus50 => {
            vec![exact, repeated, nku_exact, nku_repeated]
        }
    };
    Some(half_spread(&readings))
}

/// `(max − min) / 2` over a non-empty slice. Order-independent. A NaN reading
/// yields NaN so the corrupt value stays visible until normalization drops it.
fn half_spread(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut lo = values[0];
    let mut hi = values[0];
    for &v in values {
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    (hi - lo) / 2.0
}

/// Parse the test year out of a report's raw date string.
///
/// Accepts any string containing a plausible four-digit year (`12.05.2023`,
/// `2023-05-12`, `май 2023`). Returns `None` when no year is found — callers
/// must treat the row as year-less rather than substituting the current year,
/// which would silently corrupt yearly aggregates.
pub fn parse_test_year(date: &str) -> Option<i32> {
    let mut year = None;
    let mut current: u32 = 0;
    let mut digits = 0;

    for ch in date.chars().chain(std::iter::once(' ')) {
        if let Some(d) = ch.to_digit(10) {
            current = current.saturating_mul(10) + d;
            digits += 1;
        } else {
            if digits == 4 && (1900..=2100).contains(&current) {
                // Last plausible year wins: day.month.year puts it at the end.
                year = Some(current as i32);
            }
            current = 0;
            digits = 0;
        }
    }
    year
}
