//! Strain score engine
//!
//! Strain measures how much load the day put on the body, on a 0-100 scale
//! that saturates rather than growing without bound.
//!
//! # Algorithm
//!
//! Three sub-scores, each using exponential saturation `100 × (1 − e^(−x/k))`:
//!
//! - **Cardio** (55%): summed TRIMP-equivalent load, `k = 150`
//! - **Strength** (25%): session RPE × minutes × muscle-group volume, `k = 400`
//! - **Activity** (20%): mean of steps (`k = 10000`) and active energy (`k = 600` kcal)
//!
//! Present sub-scores are combined with renormalized weights, then multiplied
//! by a recovery factor `1 − readiness × 0.15`, where readiness in [−1, 1] is
//! derived from HRV and resting HR against baseline and the sleep score. The
//! same session costs more on a poorly recovered day.

use crate::baseline::deviation_percent;
use crate::load::{LoadEstimator, LoadMethod};
use crate::models::{
    clamp_score, renormalized_weighted_mean, ActivityType, Band, MuscleGroup, ScoreKind,
    ScoreResult, StrainBand, UserPhysiology, WorkoutRecord,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Session RPE assumed when a strength workout carries none
pub const DEFAULT_SESSION_RPE: f64 = 6.5;

/// Muscle-group count treated as equivalent to a full-body session
const FULL_BODY_GROUPS: usize = 5;

/// Sub-score weights and saturation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainConfig {
    pub cardio_weight: f64,
    pub strength_weight: f64,
    pub activity_weight: f64,

    /// Load at which the cardio sub-score reaches ~63
    pub cardio_saturation: f64,

    /// RPE-minutes at which the strength sub-score reaches ~63
    pub strength_saturation: f64,

    pub steps_saturation: f64,
    pub energy_saturation_kcal: f64,

    /// Extra volume per additional muscle group
    pub muscle_group_volume: f64,

    /// Maximum swing of the recovery factor around 1.0
    pub recovery_modifier: f64,
}

impl Default for StrainConfig {
    fn default() -> Self {
        StrainConfig {
            cardio_weight: 0.55,
            strength_weight: 0.25,
            activity_weight: 0.20,
            cardio_saturation: 150.0,
            strength_saturation: 400.0,
            steps_saturation: 10_000.0,
            energy_saturation_kcal: 600.0,
            muscle_group_volume: 0.08,
            recovery_modifier: 0.15,
        }
    }
}

/// One day of strain inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrainInputs {
    /// Summed cardio TRIMP-equivalent load for the day
    pub cardio_load: Option<f64>,
    pub cardio_minutes: Option<f64>,
    pub activity_types: Vec<ActivityType>,
    pub strength_minutes: Option<f64>,
    /// Session RPE (1-10)
    pub session_rpe: Option<f64>,
    pub muscle_groups: Vec<MuscleGroup>,
    pub steps: Option<f64>,
    pub active_energy_kcal: Option<f64>,
    pub hrv: Option<f64>,
    pub hrv_baseline: Option<f64>,
    pub resting_hr: Option<f64>,
    pub resting_hr_baseline: Option<f64>,
    pub sleep_score: Option<u8>,
}

impl StrainInputs {
    /// Build the workout part of the inputs from one day's workouts
    ///
    /// Cardio load is always present (zero on a rest day). Strength inputs
    /// are present only when a non-cardio session (strength, yoga) was logged
    /// and are scored through RPE.
    pub fn from_workouts(
        date: NaiveDate,
        workouts: &[WorkoutRecord],
        estimator: &LoadEstimator,
        physiology: &UserPhysiology,
    ) -> Self {
        let day: Vec<&WorkoutRecord> = workouts.iter().filter(|w| w.date() == date).collect();

        let (cardio, strength): (Vec<&WorkoutRecord>, Vec<&WorkoutRecord>) =
            day.iter().copied().partition(|w| w.activity_type.is_cardio());

        let cardio_load: f64 = cardio
            .iter()
            .map(|w| estimator.estimate(w, physiology))
            .filter(|r| r.method != LoadMethod::Unusable)
            .filter_map(|r| r.load.to_f64())
            .sum();
        let cardio_minutes: f64 = cardio.iter().map(|w| w.duration_minutes()).sum();

        let (strength_minutes, session_rpe) = if strength.is_empty() {
            (None, None)
        } else {
            let minutes: f64 = strength.iter().map(|w| w.duration_minutes()).sum();
            let rated: Vec<(f64, f64)> = strength
                .iter()
                .filter_map(|w| w.rpe.map(|rpe| (rpe, w.duration_minutes())))
                .collect();
            let rated_minutes: f64 = rated.iter().map(|(_, m)| m).sum();
            let rpe = if rated_minutes > 0.0 {
                Some(rated.iter().map(|(rpe, m)| rpe * m).sum::<f64>() / rated_minutes)
            } else {
                None
            };
            (Some(minutes), rpe)
        };

        let muscle_groups: BTreeSet<MuscleGroup> = strength
            .iter()
            .flat_map(|w| w.muscle_groups.iter().copied())
            .collect();

        StrainInputs {
            cardio_load: Some(cardio_load),
            cardio_minutes: Some(cardio_minutes),
            activity_types: day.iter().map(|w| w.activity_type).collect(),
            strength_minutes,
            session_rpe,
            muscle_groups: muscle_groups.into_iter().collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrainScoreEngine {
    config: StrainConfig,
}

impl StrainScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StrainConfig) -> Self {
        StrainScoreEngine { config }
    }

    /// Compute the strain score; `None` when no load component is present
    pub fn score(&self, inputs: &StrainInputs) -> Option<ScoreResult> {
        let config = &self.config;

        let cardio = inputs
            .cardio_load
            .map(|load| saturate(load, config.cardio_saturation));
        let strength = self.strength_sub_score(inputs);
        let activity = self.activity_sub_score(inputs);

        let combined = renormalized_weighted_mean(&[
            (config.cardio_weight, cardio),
            (config.strength_weight, strength),
            (config.activity_weight, activity),
        ])?;

        let readiness = readiness(inputs);
        let recovery_factor = 1.0 - readiness.unwrap_or(0.0) * config.recovery_modifier;

        let mut sub_scores = BTreeMap::new();
        for (name, value) in [
            ("cardio", cardio),
            ("strength", strength),
            ("activity", activity),
        ] {
            if let Some(value) = value {
                sub_scores.insert(name.to_string(), value);
            }
        }
        sub_scores.insert("recovery_factor".to_string(), recovery_factor);

        let score = clamp_score(combined * recovery_factor);
        debug!(score, recovery_factor, "Strain score computed");

        Some(ScoreResult {
            kind: ScoreKind::Strain,
            score,
            band: Band::Strain(StrainBand::from_score(score)),
            sub_scores,
            inputs: serde_json::to_value(inputs).unwrap_or_default(),
            explanation: Some(explanation(StrainBand::from_score(score), readiness)),
            computed_at: Utc::now(),
        })
    }

    fn strength_sub_score(&self, inputs: &StrainInputs) -> Option<f64> {
        let minutes = inputs.strength_minutes?;
        let rpe = inputs
            .session_rpe
            .unwrap_or(DEFAULT_SESSION_RPE)
            .clamp(1.0, 10.0);
        let volume = self.volume_factor(&inputs.muscle_groups);

        Some(saturate(
            rpe * minutes * volume,
            self.config.strength_saturation,
        ))
    }

    /// 1.0 for a single group, rising with each additional group up to 1.4
    fn volume_factor(&self, groups: &[MuscleGroup]) -> f64 {
        let count = if groups.contains(&MuscleGroup::FullBody) {
            FULL_BODY_GROUPS.max(groups.len())
        } else {
            groups.len()
        };

        let extra = count.saturating_sub(1) as f64;
        (1.0 + self.config.muscle_group_volume * extra).clamp(1.0, 1.4)
    }

    fn activity_sub_score(&self, inputs: &StrainInputs) -> Option<f64> {
        let parts: Vec<f64> = [
            inputs
                .steps
                .map(|steps| saturate(steps, self.config.steps_saturation)),
            inputs
                .active_energy_kcal
                .map(|kcal| saturate(kcal, self.config.energy_saturation_kcal)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.iter().sum::<f64>() / parts.len() as f64)
        }
    }
}

/// `100 × (1 − e^(−x/k))`, zero for non-positive input
fn saturate(value: f64, constant: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 || constant <= 0.0 {
        return 0.0;
    }
    100.0 * (1.0 - (-value / constant).exp())
}

/// Physiological readiness in [−1, 1]; `None` when nothing is known
fn readiness(inputs: &StrainInputs) -> Option<f64> {
    let hrv = inputs
        .hrv
        .zip(inputs.hrv_baseline)
        .and_then(|(hrv, baseline)| deviation_percent(hrv, baseline))
        .map(|d| (d / 20.0).clamp(-1.0, 1.0));
    let resting_hr = inputs
        .resting_hr
        .zip(inputs.resting_hr_baseline)
        .and_then(|(rhr, baseline)| deviation_percent(rhr, baseline))
        .map(|d| (-d / 10.0).clamp(-1.0, 1.0));
    let sleep = inputs
        .sleep_score
        .map(|s| ((s as f64 - 70.0) / 30.0).clamp(-1.0, 1.0));

    let parts: Vec<f64> = [hrv, resting_hr, sleep].into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.iter().sum::<f64>() / parts.len() as f64)
    }
}

fn explanation(band: StrainBand, readiness: Option<f64>) -> String {
    let base = match band {
        StrainBand::High => "High strain day",
        StrainBand::Moderate => "Moderate strain day",
        StrainBand::Light => "Light strain day",
    };

    match readiness {
        Some(r) if r < -0.3 => format!("{}; load weighs more while under-recovered", base),
        _ => base.to_string(),
    }
}
