//! Fixed-shape correlation matrix with root-cause catalog.
//!
//! Arranges the correlation engine's output into the 3 × 5 grid consumed by
//! the UI: conditions {NKU, −50, +50} against covariates {year, humidity,
//! production unit, product type, vibration}. Cells whose true correlation is
//! unavailable are filled with a fixed per-column placeholder so the grid is
//! always complete, but every cell stays tagged with whether its value was
//! computed — the placeholder never masquerades as a statistical result
//! upstream of presentation.
//!
//! A static catalog of root-cause narratives with remediation measures is
//! attached unconditionally.

use serde::{Deserialize, Serialize};

use crate::correlate::{self, ConditionDataset};
use crate::error::EngineError;
use crate::ledger::Ledger;
use crate::record::{MeasurementStore, TestCondition};

/// Covariate column of the matrix, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Covariate {
    Year,
    Humidity,
    ProductionUnit,
    ProductType,
    Vibration,
}

impl Covariate {
    /// Columns in display order.
    pub const ALL: [Covariate; 5] = [
        Self::Year,
        Self::Humidity,
        Self::ProductionUnit,
        Self::ProductType,
        Self::Vibration,
    ];

    /// Placeholder coefficient shown when the true correlation is
    /// unavailable. Keeps the UI consumer simple; the `computed` tag on the
    /// cell is what distinguishes it from a real value.
    pub fn fallback(self) -> f64 {
        match self {
            Self::Year => 0.1,
            Self::Humidity => 0.4,
            Self::ProductionUnit => 0.25,
            Self::ProductType => -0.2,
            Self::Vibration => 0.5,
        }
    }
}

impl std::fmt::Display for Covariate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Humidity => write!(f, "humidity"),
            Self::ProductionUnit => write!(f, "production_unit"),
            Self::ProductType => write!(f, "product_type"),
            Self::Vibration => write!(f, "vibration"),
        }
    }
}

/// One matrix cell: a coefficient plus the tag saying whether it was computed
/// from data or substituted from the column fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub value: f64,
    pub computed: bool,
}

/// One matrix row: a condition and its five cells in [`Covariate::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub condition: TestCondition,
    pub cells: [MatrixCell; 5],
}

/// A remediation action within a [`Reason`], ordered by priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub priority: u32,
    pub action: String,
}

/// Root-cause narrative for one covariate column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub title: String,
    pub description: String,
    pub measures: Vec<Measure>,
}

/// The assembled 3 × 5 matrix plus the static reason catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Column labels in cell order.
    pub columns: [Covariate; 5],
    /// One row per condition: NKU, −50, +50.
    pub rows: Vec<MatrixRow>,
    pub reasons: Vec<Reason>,
}

/// Build the matrix from the ledger and the store's covariates.
///
/// An absent or empty ledger is fatal (not-found); a ledger whose data merely
/// yields no computable correlation still produces a full grid of tagged
/// fallback cells.
pub fn build_matrix(
    ledger: &Ledger,
    store: &dyn MeasurementStore,
) -> Result<CorrelationMatrix, EngineError> {
    let datasets = correlate::load_datasets(ledger, store)?;
    let rows = datasets.iter().map(assemble_row).collect();
    Ok(CorrelationMatrix {
        columns: Covariate::ALL,
        rows,
        reasons: reason_catalog(),
    })
}

fn assemble_row(dataset: &ConditionDataset) -> MatrixRow {
    let mut cells = [MatrixCell {
        value: 0.0,
        computed: false,
    }; 5];

    for (cell, covariate) in cells.iter_mut().zip(Covariate::ALL) {
        let coefficient = match covariate {
            Covariate::Year => numeric_r(&dataset.year),
            Covariate::Humidity => numeric_r(&dataset.humidity),
            Covariate::Vibration => numeric_r(&dataset.vibration),
            // Nominal columns get the first-seen rank encoding; descriptive
            // only, never carried back into the correlation results.
            Covariate::ProductionUnit => {
                correlate::rank_encoded_correlation(&dataset.production_unit)
            }
            Covariate::ProductType => correlate::rank_encoded_correlation(&dataset.product_type),
        };
        *cell = match coefficient {
            Some(value) => MatrixCell {
                value,
                computed: true,
            },
            None => MatrixCell {
                value: covariate.fallback(),
                computed: false,
            },
        };
    }

    MatrixRow {
        condition: dataset.condition,
        cells,
    }
}

fn numeric_r(pairs: &[(f64, f64)]) -> Option<f64> {
    let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    correlate::pearson(&x, &y)
}

/// Static reference catalog of root-cause explanations, one per covariate
/// column. Attached to every matrix regardless of which cells were computed.
pub fn reason_catalog() -> Vec<Reason> {
    fn reason(title: &str, description: &str, actions: &[&str]) -> Reason {
        Reason {
            title: title.to_string(),
            description: description.to_string(),
            measures: actions
                .iter()
                .enumerate()
                .map(|(i, action)| Measure {
                    priority: i as u32 + 1,
                    action: (*action).to_string(),
                })
                .collect(),
        }
    }

    vec![
        reason(
            "Component aging across production years",
            "Sensor elements and reference oscillators sourced in different \
             years drift apart in thermal response, pushing azimuth spread up \
             in later production batches.",
            &[
                "Compare supplier certificates for sensor batches across years",
                "Requalify the thermal compensation tables for recent batches",
                "Add an incoming-inspection spread check before assembly",
            ],
        ),
        reason(
            "Humidity ingress during testing",
            "High chamber humidity condenses on optics and connector contacts, \
             degrading the repeated azimuth reading relative to the exact one.",
            &[
                "Verify chamber door seals and desiccant state before each run",
                "Log ambient humidity at test start and abort above threshold",
                "Dry-cycle the unit before the repeated measurement",
            ],
        ),
        reason(
            "Production unit process variation",
            "Assembly and alignment procedures differ between production \
             units, which shows up as a unit-level shift in mean error.",
            &[
                "Run a cross-unit calibration audit against the reference rig",
                "Align fixture maintenance schedules between units",
                "Rotate inspectors between units to surface local habits",
            ],
        ),
        reason(
            "Product type design sensitivity",
            "Some product types carry a mechanically stiffer mount whose \
             thermal expansion couples more strongly into the azimuth channel.",
            &[
                "Review mount tolerances for the types with elevated mean error",
                "Extend soak time at temperature extremes for sensitive types",
            ],
        ),
        reason(
            "External vibration during azimuth determination",
            "Floor vibration from nearby machinery perturbs the table during \
             the determination window, widening the exact/repeated spread.",
            &[
                "Isolate the test table from the building floor",
                "Schedule azimuth runs outside heavy-machinery hours",
                "Record vibration level alongside each test for gating",
            ],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
