//! Training load estimation
//!
//! Every workout is converted to a single TRIMP-equivalent value using the
//! best data the source provided. Strategies are tried in priority order and
//! the first one that produces a value wins:
//!
//! 1. Power: `TSS = hours × IF² × 100` with `IF = NP / FTP`
//! 2. Training stress precomputed by the source platform
//! 3. Heart rate reserve TRIMP: `minutes × %HRR × 0.64 × e^(1.92 × %HRR)`
//! 4. Duration only, at a moderate assumed %HRR of 0.6
//!
//! A workout that satisfies none of them contributes zero load.

use crate::models::{UserPhysiology, WorkoutRecord};
use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Method that produced a load value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMethod {
    /// Power-based TSS from normalized power and FTP
    PowerBased,
    /// Training stress supplied with the record
    Precomputed,
    /// Exponential heart-rate-reserve TRIMP
    HeartRateTrimp,
    /// Duration at an assumed moderate intensity
    DurationEstimate,
    /// Nothing usable on the record
    Unusable,
}

/// Load estimate for one workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub load: Decimal,
    pub method: LoadMethod,
    pub intensity_factor: Option<Decimal>,
    pub hrr_fraction: Option<f64>,
}

impl LoadResult {
    fn unusable() -> Self {
        LoadResult {
            load: Decimal::ZERO,
            method: LoadMethod::Unusable,
            intensity_factor: None,
            hrr_fraction: None,
        }
    }
}

/// Load totals for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    pub date: NaiveDate,

    /// Sum of all workout loads for the day
    pub total_load: Decimal,

    pub workout_count: u16,

    /// Individual workout loads in input order
    pub workout_loads: Vec<Decimal>,
}

/// Coefficients for the heart-rate and duration strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// %HRR assumed when only duration is known
    pub moderate_hrr: Decimal,

    /// TRIMP weighting coefficient
    pub trimp_coefficient: f64,

    /// TRIMP exponential intensity factor
    pub trimp_exponent: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            moderate_hrr: dec!(0.6),
            trimp_coefficient: 0.64,
            trimp_exponent: 1.92,
        }
    }
}

type Strategy = fn(&LoadEstimator, &WorkoutRecord, &UserPhysiology) -> Option<LoadResult>;

/// Converts workouts into TRIMP-equivalent load values
#[derive(Debug, Clone, Default)]
pub struct LoadEstimator {
    config: LoadConfig,
}

impl LoadEstimator {
    const STRATEGIES: [(LoadMethod, Strategy); 4] = [
        (LoadMethod::PowerBased, LoadEstimator::power_load),
        (LoadMethod::Precomputed, LoadEstimator::precomputed_load),
        (LoadMethod::HeartRateTrimp, LoadEstimator::heart_rate_load),
        (LoadMethod::DurationEstimate, LoadEstimator::duration_load),
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoadConfig) -> Self {
        LoadEstimator { config }
    }

    /// Estimate the load of a workout using the first strategy that applies
    pub fn estimate(&self, workout: &WorkoutRecord, physiology: &UserPhysiology) -> LoadResult {
        for (method, strategy) in Self::STRATEGIES.iter() {
            if let Some(result) = strategy(self, workout, physiology) {
                debug!(
                    workout_id = %workout.id,
                    method = ?method,
                    load = %result.load,
                    "Workout load estimated"
                );
                return result;
            }
        }

        warn!(
            workout_id = %workout.id,
            activity = %workout.activity_type,
            "Workout has no usable fields for load estimation; contributing zero"
        );
        LoadResult::unusable()
    }

    /// Power-based TSS
    /// TSS = (duration_hours × IF²) × 100
    fn power_load(&self, workout: &WorkoutRecord, physiology: &UserPhysiology) -> Option<LoadResult> {
        let normalized_power = workout.normalized_power.filter(|np| *np > 0)?;
        let ftp = physiology.ftp.filter(|ftp| *ftp > 0)?;

        let intensity_factor = Decimal::from(normalized_power) / Decimal::from(ftp);
        let duration_hours = Decimal::from(workout.duration_seconds) / Decimal::from(3600);
        let tss = duration_hours * intensity_factor * intensity_factor * Decimal::from(100);

        Some(LoadResult {
            load: tss,
            method: LoadMethod::PowerBased,
            intensity_factor: Some(intensity_factor),
            hrr_fraction: None,
        })
    }

    fn precomputed_load(&self, workout: &WorkoutRecord, _physiology: &UserPhysiology) -> Option<LoadResult> {
        let stress = workout.training_stress.filter(|s| !s.is_sign_negative())?;

        Some(LoadResult {
            load: stress,
            method: LoadMethod::Precomputed,
            intensity_factor: None,
            hrr_fraction: None,
        })
    }

    /// Exponential heart-rate TRIMP
    /// TRIMP = minutes × %HRR × 0.64 × e^(1.92 × %HRR)
    fn heart_rate_load(&self, workout: &WorkoutRecord, physiology: &UserPhysiology) -> Option<LoadResult> {
        let avg_hr = workout.average_heart_rate?;
        let max_hr = physiology.max_hr?;
        let resting_hr = physiology.resting_hr?;
        if max_hr <= resting_hr {
            return None;
        }

        let hrr = Self::hrr_fraction(avg_hr, max_hr, resting_hr);
        let trimp = workout.duration_minutes()
            * hrr
            * self.config.trimp_coefficient
            * (self.config.trimp_exponent * hrr).exp();

        // Use f64 for the exponential, then convert back
        let load = Decimal::from_f64(trimp).unwrap_or(Decimal::ZERO);

        Some(LoadResult {
            load,
            method: LoadMethod::HeartRateTrimp,
            intensity_factor: None,
            hrr_fraction: Some(hrr),
        })
    }

    fn duration_load(&self, workout: &WorkoutRecord, _physiology: &UserPhysiology) -> Option<LoadResult> {
        if workout.duration_seconds == 0 {
            return None;
        }

        let duration_minutes = Decimal::from(workout.duration_seconds) / Decimal::from(60);

        Some(LoadResult {
            load: duration_minutes * self.config.moderate_hrr,
            method: LoadMethod::DurationEstimate,
            intensity_factor: None,
            hrr_fraction: self.config.moderate_hrr.to_f64(),
        })
    }

    /// Fraction of heart rate reserve, clamped to [0, 1]
    pub fn hrr_fraction(avg_hr: u16, max_hr: u16, resting_hr: u16) -> f64 {
        let reserve = max_hr as f64 - resting_hr as f64;
        if reserve <= 0.0 {
            return 0.0;
        }
        ((avg_hr as f64 - resting_hr as f64) / reserve).clamp(0.0, 1.0)
    }

    /// Aggregate per-day load across all workouts
    ///
    /// Workouts are expected to be deduplicated by the caller.
    pub fn daily_loads(
        &self,
        workouts: &[WorkoutRecord],
        physiology: &UserPhysiology,
    ) -> BTreeMap<NaiveDate, DailyLoad> {
        let mut daily: BTreeMap<NaiveDate, DailyLoad> = BTreeMap::new();

        for workout in workouts {
            let load = self.estimate(workout, physiology).load;
            let date = workout.date();

            daily
                .entry(date)
                .and_modify(|day| {
                    day.total_load += load;
                    day.workout_count += 1;
                    day.workout_loads.push(load);
                })
                .or_insert(DailyLoad {
                    date,
                    total_load: load,
                    workout_count: 1,
                    workout_loads: vec![load],
                });
        }

        daily
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;

    fn create_workout(duration_seconds: u32) -> WorkoutRecord {
        WorkoutRecord {
            id: "workout_1".to_string(),
            start: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 9, 23, 7, 30, 0)
                .unwrap(),
            duration_seconds,
            activity_type: ActivityType::Cycling,
            average_power: None,
            normalized_power: None,
            average_heart_rate: None,
            training_stress: None,
            rpe: None,
            muscle_groups: Vec::new(),
            source: Some("test".to_string()),
        }
    }

    fn create_physiology() -> UserPhysiology {
        UserPhysiology {
            ftp: Some(250),
            max_hr: Some(190),
            resting_hr: Some(50),
            body_mass_kg: Some(70.0),
        }
    }

    #[test]
    fn test_power_based_load() {
        let mut workout = create_workout(3600);
        workout.normalized_power = Some(250);

        let result = LoadEstimator::new().estimate(&workout, &create_physiology());

        assert_eq!(result.method, LoadMethod::PowerBased);
        assert_eq!(result.intensity_factor, Some(dec!(1)));
        assert_eq!(result.load, dec!(100));
    }

    #[test]
    fn test_power_requires_positive_ftp() {
        let mut workout = create_workout(3600);
        workout.normalized_power = Some(250);
        workout.training_stress = Some(dec!(72));

        let physiology = UserPhysiology {
            ftp: Some(0),
            ..create_physiology()
        };
        let result = LoadEstimator::new().estimate(&workout, &physiology);

        assert_eq!(result.method, LoadMethod::Precomputed);
        assert_eq!(result.load, dec!(72));
    }

    #[test]
    fn test_precomputed_beats_heart_rate() {
        let mut workout = create_workout(3600);
        workout.training_stress = Some(dec!(85.5));
        workout.average_heart_rate = Some(150);

        let result = LoadEstimator::new().estimate(&workout, &create_physiology());
        assert_eq!(result.method, LoadMethod::Precomputed);
        assert_eq!(result.load, dec!(85.5));
    }

    #[test]
    fn test_heart_rate_trimp() {
        let mut workout = create_workout(3600);
        workout.average_heart_rate = Some(134); // %HRR = 84 / 140 = 0.6

        let result = LoadEstimator::new().estimate(&workout, &create_physiology());

        assert_eq!(result.method, LoadMethod::HeartRateTrimp);
        let hrr = result.hrr_fraction.unwrap();
        assert!((hrr - 0.6).abs() < 1e-9);

        let expected = 60.0 * 0.6 * 0.64 * (1.92f64 * 0.6).exp();
        let load = result.load.to_f64().unwrap();
        assert!((load - expected).abs() < 1e-6, "{} vs {}", load, expected);
    }

    #[test]
    fn test_heart_rate_needs_valid_reserve() {
        let mut workout = create_workout(1800);
        workout.average_heart_rate = Some(140);

        let physiology = UserPhysiology {
            max_hr: Some(50),
            resting_hr: Some(50),
            ..create_physiology()
        };
        let result = LoadEstimator::new().estimate(&workout, &physiology);
        assert_eq!(result.method, LoadMethod::DurationEstimate);
    }

    #[test]
    fn test_duration_only_fallback() {
        let workout = create_workout(3600);
        let result = LoadEstimator::new().estimate(&workout, &UserPhysiology::default());

        assert_eq!(result.method, LoadMethod::DurationEstimate);
        assert_eq!(result.load, dec!(36));
    }

    #[test]
    fn test_unusable_workout_contributes_zero() {
        let workout = create_workout(0);
        let result = LoadEstimator::new().estimate(&workout, &UserPhysiology::default());

        assert_eq!(result.method, LoadMethod::Unusable);
        assert_eq!(result.load, Decimal::ZERO);
    }

    #[test]
    fn test_hrr_fraction_clamped() {
        assert_eq!(LoadEstimator::hrr_fraction(40, 190, 50), 0.0);
        assert_eq!(LoadEstimator::hrr_fraction(210, 190, 50), 1.0);
        assert_eq!(LoadEstimator::hrr_fraction(150, 50, 50), 0.0);
    }

    #[test]
    fn test_daily_load_aggregation() {
        let estimator = LoadEstimator::new();
        let mut ride = create_workout(3600);
        ride.normalized_power = Some(250);
        let walk = create_workout(1800);

        let daily = estimator.daily_loads(&[ride, walk], &create_physiology());

        assert_eq!(daily.len(), 1);
        let day = daily.values().next().unwrap();
        assert_eq!(day.total_load, dec!(118));
        assert_eq!(day.workout_count, 2);
        assert_eq!(day.workout_loads, vec![dec!(100), dec!(18)]);
    }

    proptest! {
        #[test]
        fn test_load_is_never_negative(
            duration in 0u32..14_400u32,
            avg_hr in proptest::option::of(30u16..220u16),
            np in proptest::option::of(0u16..500u16),
        ) {
            let mut workout = create_workout(duration);
            workout.average_heart_rate = avg_hr;
            workout.normalized_power = np;

            let result = LoadEstimator::new().estimate(&workout, &create_physiology());
            prop_assert!(result.load >= Decimal::ZERO);
        }

        #[test]
        fn test_trimp_increases_with_intensity(
            hr_low in 60u16..120u16,
            delta in 1u16..60u16,
        ) {
            let physiology = create_physiology();
            let estimator = LoadEstimator::new();

            let mut easy = create_workout(3600);
            easy.average_heart_rate = Some(hr_low);
            let mut hard = create_workout(3600);
            hard.average_heart_rate = Some(hr_low + delta);

            let easy_load = estimator.estimate(&easy, &physiology).load;
            let hard_load = estimator.estimate(&hard, &physiology).load;
            prop_assert!(hard_load > easy_load);
        }
    }
}
