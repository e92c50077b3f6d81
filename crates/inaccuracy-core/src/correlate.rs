//! Covariate correlation over the normalized error series.
//!
//! For each temperature condition the engine joins ledger rows back to the
//! measurement store by product number and computes, pairwise-complete per
//! covariate:
//!
//! - Pearson r, a t-statistic, and a two-tailed p-value for the interval
//!   covariates {year, humidity, vibration};
//! - mean normalized error per product-type and per production-unit category.
//!
//! Nominal covariates never go through the numeric correlation path in these
//! results; the first-seen rank encoding in [`rank_encoded_correlation`]
//! exists solely to fill the type/unit columns of the display matrix and is
//! descriptive only.
//!
//! Degenerate input (fewer than 3 pairs, or fewer than 2 distinct values on
//! either side) yields an absent coefficient, logged, never a fabricated one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::EngineError;
use crate::ledger::{K_MAX, Ledger, LedgerRow};
use crate::record::{Covariates, MeasurementStore, TestCondition};

/// Two-tailed critical value at α = 0.05 for a large sample. Applied as a
/// fixed cut, no small-sample correction.
pub const T_CRITICAL: f64 = 1.96;

/// Minimum joined pairs for a correlation to be computed at all.
const MIN_PAIRS: usize = 3;

/// Pearson correlation outcome for one covariate. All statistics are absent
/// when the joined series was degenerate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationStat {
    /// Pearson r, absent on degenerate input.
    pub r: Option<f64>,
    /// `|r| / sqrt((1 − r²) / (n − 2))`.
    pub t: Option<f64>,
    /// Two-tailed p-value from the standard normal, alongside the fixed cut.
    pub p_value: Option<f64>,
    /// Whether `|t|` exceeds [`T_CRITICAL`].
    pub significant: bool,
    /// Number of joined (covariate, ratio) pairs.
    pub pairs: usize,
}

/// Mean normalized error for one nominal category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMean {
    pub category: String,
    pub mean: f64,
    pub count: usize,
}

/// Correlation results for one temperature condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCorrelation {
    pub condition: TestCondition,
    /// Ledger rows contributing a valid normalized error for this condition.
    pub points: usize,
    pub year: CorrelationStat,
    pub humidity: CorrelationStat,
    pub vibration: CorrelationStat,
    pub by_product_type: Vec<CategoryMean>,
    pub by_production_unit: Vec<CategoryMean>,
}

/// Joined per-condition series, shared between the correlation results and
/// the matrix assembler.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConditionDataset {
    pub condition: TestCondition,
    pub points: usize,
    pub year: Vec<(f64, f64)>,
    pub humidity: Vec<(f64, f64)>,
    pub vibration: Vec<(f64, f64)>,
    pub product_type: Vec<(String, f64)>,
    pub production_unit: Vec<(String, f64)>,
}

/// Compute correlation results for all three conditions.
///
/// An absent or entirely empty ledger is fatal to the request (not-found),
/// never a silent empty result.
pub fn compute_correlations(
    ledger: &Ledger,
    store: &dyn MeasurementStore,
) -> Result<Vec<ConditionCorrelation>, EngineError> {
    let datasets = load_datasets(ledger, store)?;
    Ok(datasets
        .into_iter()
        .map(|d| ConditionCorrelation {
            condition: d.condition,
            points: d.points,
            year: covariate_stat(&d.year, d.condition, "year"),
            humidity: covariate_stat(&d.humidity, d.condition, "humidity"),
            vibration: covariate_stat(&d.vibration, d.condition, "vibration"),
            by_product_type: category_means(&d.product_type),
            by_production_unit: category_means(&d.production_unit),
        })
        .collect())
}

/// Read the ledger and join each row's covariates from the store.
pub(crate) fn load_datasets(
    ledger: &Ledger,
    store: &dyn MeasurementStore,
) -> Result<Vec<ConditionDataset>, EngineError> {
    let rows = ledger.read_rows()?;
    if rows.is_empty() {
        return Err(EngineError::LedgerEmpty(ledger.path().to_path_buf()));
    }
    let covariates: HashMap<i64, Covariates> =
        store.list_all_with_covariates().into_iter().collect();

    Ok(TestCondition::ALL
        .into_iter()
        .map(|condition| build_dataset(&rows, &covariates, condition))
        .collect())
}

fn build_dataset(
    rows: &[LedgerRow],
    covariates: &HashMap<i64, Covariates>,
    condition: TestCondition,
) -> ConditionDataset {
    let mut dataset = ConditionDataset {
        condition,
        ..Default::default()
    };

    for row in rows {
        let Some(error) = row.error(condition) else {
            continue;
        };
        let ratio = error / K_MAX;
        if ratio.is_nan() {
            continue;
        }
        dataset.points += 1;

        if let Some(year) = row.year {
            dataset.year.push((f64::from(year), ratio));
        }

        let Some(cov) = covariates.get(&row.product_number) else {
            continue;
        };
        if let Some(humidity) = cov.humidity {
            if humidity.is_finite() {
                dataset.humidity.push((humidity, ratio));
            } else {
                log::warn!(
                    "product {}: non-finite humidity {humidity} skipped",
                    row.product_number
                );
            }
        }
        if let Some(vibration) = cov.vibration_level {
            if vibration.is_finite() {
                dataset.vibration.push((vibration, ratio));
            } else {
                log::warn!(
                    "product {}: non-finite vibration level {vibration} skipped",
                    row.product_number
                );
            }
        }
        if let Some(ref product_type) = cov.product_type {
            dataset.product_type.push((product_type.clone(), ratio));
        }
        if let Some(ref unit) = cov.production_unit {
            dataset.production_unit.push((unit.clone(), ratio));
        }
    }
    dataset
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Pearson correlation coefficient over paired slices.
///
/// Returns `None` for fewer than 3 pairs, fewer than 2 distinct values on
/// either side, or a vanishing variance product — correlation is undefined
/// there, not zero.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < MIN_PAIRS {
        return None;
    }
    if distinct_values(x) < 2 || distinct_values(y) < 2 {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-12 {
        return None;
    }
    Some(cov / denom)
}

/// `|r| / sqrt((1 − r²) / (n − 2))`. The variance floor keeps a perfect
/// correlation finite instead of dividing by zero. Undefined (NaN) for fewer
/// than 3 samples.
pub fn t_statistic(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return f64::NAN;
    }
    ((n - 2) as f64 / (1.0 - r * r).max(1e-12)).sqrt() * r.abs()
}

fn covariate_stat(
    pairs: &[(f64, f64)],
    condition: TestCondition,
    covariate: &str,
) -> CorrelationStat {
    let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let mut stat = CorrelationStat {
        pairs: pairs.len(),
        ..Default::default()
    };
    let Some(r) = pearson(&x, &y) else {
        log::debug!(
            "{condition}/{covariate}: correlation unavailable ({} pairs, insufficient variation)",
            pairs.len()
        );
        return stat;
    };

    let t = t_statistic(r, pairs.len());
    let normal = Normal::new(0.0, 1.0).unwrap();
    stat.r = Some(r);
    stat.t = Some(t);
    stat.p_value = Some(2.0 * (1.0 - normal.cdf(t)));
    stat.significant = t > T_CRITICAL;
    stat
}

/// Mean ratio per category, in first-seen order.
fn category_means(pairs: &[(String, f64)]) -> Vec<CategoryMean> {
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    for (category, ratio) in pairs {
        match groups.iter_mut().find(|(c, _, _)| c == category) {
            Some((_, sum, count)) => {
                *sum += ratio;
                *count += 1;
            }
            None => groups.push((category.clone(), *ratio, 1)),
        }
    }
    groups
        .into_iter()
        .map(|(category, sum, count)| CategoryMean {
            category,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

/// Pearson correlation of the ratios against a first-seen rank encoding of a
/// nominal covariate.
///
/// The rank is an arbitrary stable integer label, not an ordinal scale, so
/// the coefficient is descriptive only. It feeds the type/unit columns of the
/// display matrix and carries no significance claim.
pub(crate) fn rank_encoded_correlation(pairs: &[(String, f64)]) -> Option<f64> {
    let mut seen: Vec<&str> = Vec::new();
    let mut ranks = Vec::with_capacity(pairs.len());
    let mut ratios = Vec::with_capacity(pairs.len());
    for (category, ratio) in pairs {
        let rank = match seen.iter().position(|c| c == category) {
            Some(i) => i,
            None => {
                seen.push(category);
                seen.len() - 1
            }
        };
        ranks.push(rank as f64);
        ratios.push(*ratio);
    }
    pearson(&ranks, &ratios)
}

fn distinct_values(values: &[f64]) -> usize {
    let mut bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
    bits.sort_unstable();
    bits.dedup();
    bits.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
