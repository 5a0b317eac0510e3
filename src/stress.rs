//! Synthesized daily stress index
//!
//! Stress starts from a neutral 50 and each present factor adds a weighted
//! contribution:
//!
//! | Factor     | Contribution                          |
//! |------------|---------------------------------------|
//! | Recovery   | `(100 − recovery) × 0.30`             |
//! | HRV        | `(baseline − hrv) / baseline × 100 × 0.25` |
//! | Resting HR | `max(0, rhr − 60) × 2 × 0.20`         |
//! | Sleep      | `(100 − sleep) × 0.15`                |
//! | Load       | `load × 0.10`                         |
//!
//! The sum is clamped to [0, 100]. Dates with fewer than two factors are
//! dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressWeights {
    pub base: f64,
    pub recovery: f64,
    pub hrv: f64,
    pub resting_hr: f64,
    pub sleep: f64,
    pub load: f64,

    /// Resting HR above which the RHR factor contributes
    pub resting_hr_reference: f64,
    pub resting_hr_multiplier: f64,

    /// Factors required for a date to be reported
    pub min_factors: usize,
}

impl Default for StressWeights {
    fn default() -> Self {
        StressWeights {
            base: 50.0,
            recovery: 0.30,
            hrv: 0.25,
            resting_hr: 0.20,
            sleep: 0.15,
            load: 0.10,
            resting_hr_reference: 60.0,
            resting_hr_multiplier: 2.0,
            min_factors: 2,
        }
    }
}

/// Stress value for one date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressPoint {
    pub date: NaiveDate,
    pub stress: f64,
    /// Number of factors that contributed
    pub factor_count: usize,
}

/// Date-indexed factor sources; each map may cover different dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressInputs {
    pub recovery: BTreeMap<NaiveDate, f64>,
    pub hrv: BTreeMap<NaiveDate, f64>,
    pub hrv_baseline: Option<f64>,
    pub resting_hr: BTreeMap<NaiveDate, f64>,
    pub sleep: BTreeMap<NaiveDate, f64>,
    pub load: BTreeMap<NaiveDate, f64>,
}

impl StressInputs {
    /// Union of all dates with any source data
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.recovery
            .keys()
            .chain(self.hrv.keys())
            .chain(self.resting_hr.keys())
            .chain(self.sleep.keys())
            .chain(self.load.keys())
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StressSynthesizer {
    weights: StressWeights,
}

impl StressSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: StressWeights) -> Self {
        StressSynthesizer { weights }
    }

    /// Stress series over every date that has enough factors
    pub fn synthesize(&self, inputs: &StressInputs) -> Vec<StressPoint> {
        inputs
            .dates()
            .into_iter()
            .filter_map(|date| {
                self.stress_for(
                    date,
                    inputs.recovery.get(&date).copied(),
                    inputs.hrv.get(&date).copied(),
                    inputs.hrv_baseline,
                    inputs.resting_hr.get(&date).copied(),
                    inputs.sleep.get(&date).copied(),
                    inputs.load.get(&date).copied(),
                )
            })
            .collect()
    }

    /// Stress for one date from whichever factors are present
    #[allow(clippy::too_many_arguments)]
    pub fn stress_for(
        &self,
        date: NaiveDate,
        recovery: Option<f64>,
        hrv: Option<f64>,
        hrv_baseline: Option<f64>,
        resting_hr: Option<f64>,
        sleep: Option<f64>,
        load: Option<f64>,
    ) -> Option<StressPoint> {
        let w = &self.weights;

        let hrv_contribution = hrv
            .zip(hrv_baseline.filter(|b| b.is_finite() && *b > 0.0))
            .map(|(hrv, baseline)| (baseline - hrv) / baseline * 100.0 * w.hrv);

        let contributions: Vec<f64> = [
            recovery.map(|r| (100.0 - r) * w.recovery),
            hrv_contribution,
            resting_hr.map(|rhr| {
                (rhr - w.resting_hr_reference).max(0.0) * w.resting_hr_multiplier * w.resting_hr
            }),
            sleep.map(|s| (100.0 - s) * w.sleep),
            load.map(|l| l * w.load),
        ]
        .into_iter()
        .flatten()
        .filter(|c| c.is_finite())
        .collect();

        if contributions.len() < w.min_factors {
            debug!(%date, factors = contributions.len(), "Stress dropped: too few factors");
            return None;
        }

        let stress = (w.base + contributions.iter().sum::<f64>()).clamp(0.0, 100.0);

        Some(StressPoint {
            date,
            stress,
            factor_count: contributions.len(),
        })
    }
}
