//! Recovery score engine
//!
//! Combines how today's physiology compares to personal baselines into a
//! single 0-100 readiness score.
//!
//! # Sub-scores
//!
//! Each sub-score is in [0, 100] and is omitted when its input or baseline is
//! missing:
//!
//! - **HRV**: `70 + 2 × deviation%`, preferring overnight HRV over the latest reading
//! - **Resting HR**: `70 − 4 × deviation%` (an elevated RHR lowers the score)
//! - **Sleep**: today's sleep score, or sleep duration against baseline
//! - **Respiratory rate**: `100 − 6 × |deviation%|`
//! - **Form**: `60 + 1.5 × TSB`, less a penalty for a week of heavy strain
//!
//! Weights renormalize over the sub-scores that are present, so partial data
//! is neither penalized nor boosted.
//!
//! # Bands
//!
//! 75-100 Optimal, 50-74 Good, below 50 Fair. This three-tier scale is
//! separate from the four-band display scale used for sleep.

use crate::baseline::deviation_percent;
use crate::models::{
    clamp_score, renormalized_weighted_mean, Band, MetricKind, MetricSample, RecoveryBand,
    ScoreKind, ScoreResult, SleepSession,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// HRV status categories based on comparison to personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HrvStatus {
    /// HRV well below baseline, indicates poor recovery
    Poor,
    /// HRV moderately below baseline, indicates partial recovery
    Unbalanced,
    /// HRV within normal range of baseline, indicates good recovery
    Balanced,
    /// No valid HRV reading or baseline available
    NoReading,
}

impl fmt::Display for HrvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HrvStatus::Poor => write!(f, "Poor"),
            HrvStatus::Unbalanced => write!(f, "Unbalanced"),
            HrvStatus::Balanced => write!(f, "Balanced"),
            HrvStatus::NoReading => write!(f, "No Reading"),
        }
    }
}

impl HrvStatus {
    /// Balanced within 15% below baseline, Unbalanced to 30% below, Poor beyond
    pub fn from_deviation(hrv: Option<f64>, baseline: Option<f64>) -> Self {
        let deviation = match (hrv, baseline) {
            (Some(hrv), Some(baseline)) => deviation_percent(hrv, baseline),
            _ => None,
        };

        match deviation {
            None => HrvStatus::NoReading,
            Some(d) if d >= -15.0 => HrvStatus::Balanced,
            Some(d) if d >= -30.0 => HrvStatus::Unbalanced,
            Some(_) => HrvStatus::Poor,
        }
    }
}

/// Sub-score weights for the recovery score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryWeights {
    pub hrv: f64,
    pub resting_hr: f64,
    pub sleep: f64,
    pub respiratory_rate: f64,
    pub form: f64,
}

impl Default for RecoveryWeights {
    fn default() -> Self {
        RecoveryWeights {
            hrv: 0.35,
            resting_hr: 0.20,
            sleep: 0.25,
            respiratory_rate: 0.10,
            form: 0.10,
        }
    }
}

/// Recovery engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub weights: RecoveryWeights,

    /// Average daily strain above which the form sub-score is penalized
    pub strain_tolerance: f64,

    /// Form points lost per strain point above tolerance
    pub strain_penalty: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            weights: RecoveryWeights::default(),
            strain_tolerance: 50.0,
            strain_penalty: 0.8,
        }
    }
}

/// Everything the recovery engine looks at for one day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryInputs {
    pub current_hrv: Option<f64>,
    /// Mean HRV over the night's actual sleep window
    pub overnight_hrv: Option<f64>,
    pub hrv_baseline: Option<f64>,
    pub resting_hr: Option<f64>,
    pub resting_hr_baseline: Option<f64>,
    pub sleep_duration_hours: Option<f64>,
    pub sleep_duration_baseline: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub respiratory_rate_baseline: Option<f64>,
    pub atl: Option<Decimal>,
    pub ctl: Option<Decimal>,
    /// Sum of strain scores over the last seven days
    pub seven_day_strain: Option<f64>,
    /// Today's finished sleep score
    pub sleep_score: Option<u8>,
    pub illness_present: bool,
    pub sleep_data_present: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryScoreEngine {
    config: RecoveryConfig,
}

impl RecoveryScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        RecoveryScoreEngine { config }
    }

    /// Compute the recovery score; `None` when no sub-score can be formed
    pub fn score(&self, inputs: &RecoveryInputs) -> Option<ScoreResult> {
        let weights = &self.config.weights;

        let hrv = self.hrv_sub_score(inputs);
        let resting_hr = self.resting_hr_sub_score(inputs);
        let sleep = self.sleep_sub_score(inputs);
        let respiratory = self.respiratory_sub_score(inputs);
        let form = self.form_sub_score(inputs);

        let combined = renormalized_weighted_mean(&[
            (weights.hrv, hrv),
            (weights.resting_hr, resting_hr),
            (weights.sleep, sleep),
            (weights.respiratory_rate, respiratory),
            (weights.form, form),
        ]);

        let combined = match combined {
            Some(value) => value,
            None => {
                debug!("Recovery unavailable: no sub-scores");
                return None;
            }
        };

        let sub_scores: BTreeMap<String, f64> = [
            ("hrv", hrv),
            ("resting_hr", resting_hr),
            ("sleep", sleep),
            ("respiratory_rate", respiratory),
            ("form", form),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect();

        let score = clamp_score(combined);
        let band = RecoveryBand::from_score(score);
        debug!(score, sub_scores = sub_scores.len(), "Recovery score computed");

        Some(ScoreResult {
            kind: ScoreKind::Recovery,
            score,
            band: Band::Recovery(band),
            sub_scores,
            inputs: serde_json::to_value(inputs).unwrap_or_default(),
            explanation: Some(self.explanation(inputs, band)),
            computed_at: Utc::now(),
        })
    }

    fn hrv_sub_score(&self, inputs: &RecoveryInputs) -> Option<f64> {
        let hrv = inputs.overnight_hrv.or(inputs.current_hrv)?;
        let deviation = deviation_percent(hrv, inputs.hrv_baseline?)?;
        Some((70.0 + 2.0 * deviation).clamp(0.0, 100.0))
    }

    fn resting_hr_sub_score(&self, inputs: &RecoveryInputs) -> Option<f64> {
        let deviation = deviation_percent(inputs.resting_hr?, inputs.resting_hr_baseline?)?;
        Some((70.0 - 4.0 * deviation).clamp(0.0, 100.0))
    }

    fn sleep_sub_score(&self, inputs: &RecoveryInputs) -> Option<f64> {
        if let Some(score) = inputs.sleep_score {
            return Some((score as f64).min(100.0));
        }

        let hours = inputs.sleep_duration_hours?;
        let baseline = inputs.sleep_duration_baseline.filter(|b| *b > 0.0)?;
        Some((hours / baseline * 85.0).clamp(0.0, 100.0))
    }

    fn respiratory_sub_score(&self, inputs: &RecoveryInputs) -> Option<f64> {
        let deviation = deviation_percent(
            inputs.respiratory_rate?,
            inputs.respiratory_rate_baseline?,
        )?;
        Some((100.0 - 6.0 * deviation.abs()).clamp(0.0, 100.0))
    }

    fn form_sub_score(&self, inputs: &RecoveryInputs) -> Option<f64> {
        let tsb = match (inputs.ctl, inputs.atl) {
            (Some(ctl), Some(atl)) => (ctl - atl).to_f64(),
            _ => None,
        };

        let penalty = inputs
            .seven_day_strain
            .map(|total| {
                let average = total / 7.0;
                (average - self.config.strain_tolerance).max(0.0) * self.config.strain_penalty
            })
            .unwrap_or(0.0);

        let base = match (tsb, inputs.seven_day_strain) {
            (Some(tsb), _) => 60.0 + 1.5 * tsb,
            (None, Some(_)) => 70.0,
            (None, None) => return None,
        };

        Some((base - penalty).clamp(0.0, 100.0))
    }

    fn explanation(&self, inputs: &RecoveryInputs, band: RecoveryBand) -> String {
        if inputs.illness_present {
            return "Signs of illness detected; prioritize rest".to_string();
        }
        if !inputs.sleep_data_present {
            return "No sleep recorded; score based on available signals".to_string();
        }

        let hrv_status = HrvStatus::from_deviation(
            inputs.overnight_hrv.or(inputs.current_hrv),
            inputs.hrv_baseline,
        );

        match (band, hrv_status) {
            (RecoveryBand::Optimal, _) => "Well recovered and ready for strenuous training",
            (RecoveryBand::Good, HrvStatus::Unbalanced | HrvStatus::Poor) => {
                "HRV below baseline; keep intensity moderate"
            }
            (RecoveryBand::Good, _) => "Adequately recovered for planned training",
            (RecoveryBand::Fair, _) => "Under-recovered; favor light activity and rest",
        }
        .to_string()
    }
}

/// Mean HRV over samples recorded inside the sleep session window
pub fn overnight_hrv(samples: &[MetricSample], session: &SleepSession) -> Option<f64> {
    let values: Vec<f64> = samples
        .iter()
        .filter(|s| s.kind == MetricKind::Hrv && s.value.is_finite())
        .filter(|s| s.timestamp >= session.bedtime && s.timestamp <= session.wake_time)
        .map(|s| s.value)
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}
