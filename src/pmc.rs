use crate::load::DailyLoad;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// PMC calculation errors
#[derive(Error, Debug)]
pub enum PmcError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// PMC configuration with customizable time constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcConfig {
    /// CTL time constant in days (default: 42)
    pub ctl_time_constant: u16,

    /// ATL time constant in days (default: 7)
    pub atl_time_constant: u16,

    /// Ramp rate calculation period in days
    pub ramp_rate_days: u16,
}

impl Default for PmcConfig {
    fn default() -> Self {
        PmcConfig {
            ctl_time_constant: 42,
            atl_time_constant: 7,
            ramp_rate_days: 7,
        }
    }
}

impl PmcConfig {
    pub fn validate(&self) -> Result<(), PmcError> {
        if self.ctl_time_constant == 0 || self.atl_time_constant == 0 {
            return Err(PmcError::ConfigurationError(
                "Time constants must be at least one day".to_string(),
            ));
        }
        Ok(())
    }
}

/// Acute/chronic training load state
///
/// `tsb` is always exactly `ctl - atl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingLoadState {
    /// Acute Training Load (7-day exponentially weighted average)
    pub atl: Decimal,

    /// Chronic Training Load (42-day exponentially weighted average)
    pub ctl: Decimal,

    /// Training Stress Balance (CTL - ATL), a.k.a. form
    pub tsb: Decimal,
}

impl TrainingLoadState {
    pub fn new(ctl: Decimal, atl: Decimal) -> Self {
        TrainingLoadState {
            atl,
            ctl,
            tsb: ctl - atl,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    pub fn interpretation(&self) -> TsbInterpretation {
        TsbInterpretation::from_tsb(self.tsb)
    }
}

impl Default for TrainingLoadState {
    fn default() -> Self {
        Self::zero()
    }
}

/// PMC metrics for a specific date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcPoint {
    pub date: NaiveDate,

    pub state: TrainingLoadState,

    /// Daily load used in the update
    pub daily_load: Decimal,

    /// Ramp rate (CTL change per week)
    pub ctl_ramp_rate: Option<Decimal>,
}

/// Training Stress Balance interpretation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TsbInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl TsbInterpretation {
    /// Get TSB interpretation from numeric value
    pub fn from_tsb(tsb: Decimal) -> Self {
        if tsb >= Decimal::from(25) {
            TsbInterpretation::VeryFresh
        } else if tsb >= Decimal::from(5) {
            TsbInterpretation::Fresh
        } else if tsb >= Decimal::from(-10) {
            TsbInterpretation::Neutral
        } else if tsb >= Decimal::from(-30) {
            TsbInterpretation::Fatigued
        } else {
            TsbInterpretation::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TsbInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            TsbInterpretation::Fresh => "Fresh and ready for hard training",
            TsbInterpretation::Neutral => "Neutral (normal training)",
            TsbInterpretation::Fatigued => "Fatigued (monitor closely)",
            TsbInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            TsbInterpretation::VeryFresh => "Consider increasing training load",
            TsbInterpretation::Fresh => "Good time for high-intensity sessions",
            TsbInterpretation::Neutral => "Continue normal training progression",
            TsbInterpretation::Fatigued => "Reduce intensity, focus on recovery sessions",
            TsbInterpretation::VeryFatigued => {
                "Prioritize rest and recovery before resuming training"
            }
        }
    }
}

/// Core PMC calculation engine
#[derive(Debug, Clone, Default)]
pub struct PmcCalculator {
    config: PmcConfig,
}

impl PmcCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PmcConfig) -> Self {
        PmcCalculator { config }
    }

    /// Apply one day of load to the state
    ///
    /// ATL' = ATL + (L - ATL) / atl_time_constant
    /// CTL' = CTL + (L - CTL) / ctl_time_constant
    pub fn step(&self, previous: &TrainingLoadState, daily_load: Decimal) -> TrainingLoadState {
        let load = daily_load.max(Decimal::ZERO);
        let atl_constant = Decimal::from(self.config.atl_time_constant.max(1));
        let ctl_constant = Decimal::from(self.config.ctl_time_constant.max(1));

        let atl = previous.atl + (load - previous.atl) / atl_constant;
        let ctl = previous.ctl + (load - previous.ctl) / ctl_constant;

        TrainingLoadState::new(ctl, atl)
    }

    /// Advance the state by `elapsed_days`, with `daily_load` landing on the last day
    ///
    /// Intervening days are rest days (zero load). An elapsed count of zero is
    /// treated as a single step.
    pub fn update(
        &self,
        previous: &TrainingLoadState,
        daily_load: Decimal,
        elapsed_days: u32,
    ) -> TrainingLoadState {
        let rest_days = elapsed_days.max(1) - 1;
        let rested = (0..rest_days).fold(*previous, |state, _| self.step(&state, Decimal::ZERO));
        self.step(&rested, daily_load)
    }

    /// PMC series for a date range, starting from `initial` on the day before `start_date`
    pub fn series(
        &self,
        daily_loads: &BTreeMap<NaiveDate, DailyLoad>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial: TrainingLoadState,
    ) -> Result<Vec<PmcPoint>, PmcError> {
        if start_date > end_date {
            return Err(PmcError::InvalidDateRange(
                "Start date must be before end date".to_string(),
            ));
        }

        let mut points: Vec<PmcPoint> = Vec::new();
        let mut state = initial;

        for date in start_date.iter_days().take_while(|d| *d <= end_date) {
            let daily_load = daily_loads
                .get(&date)
                .map(|d| d.total_load)
                .unwrap_or(Decimal::ZERO);

            state = self.step(&state, daily_load);
            let ctl_ramp_rate = self.ramp_rate(&points, state.ctl);

            points.push(PmcPoint {
                date,
                state,
                daily_load,
                ctl_ramp_rate,
            });
        }

        Ok(points)
    }

    /// State as of `as_of`, replaying every recorded day from the first workout
    pub fn state_as_of(
        &self,
        daily_loads: &BTreeMap<NaiveDate, DailyLoad>,
        as_of: NaiveDate,
    ) -> TrainingLoadState {
        let start = match daily_loads.keys().next() {
            Some(first) if *first <= as_of => *first,
            _ => return TrainingLoadState::zero(),
        };

        self.series(daily_loads, start, as_of, TrainingLoadState::zero())
            .ok()
            .and_then(|points| points.last().map(|p| p.state))
            .unwrap_or_default()
    }

    /// CTL change per week relative to `ramp_rate_days` ago
    fn ramp_rate(&self, history: &[PmcPoint], current_ctl: Decimal) -> Option<Decimal> {
        let days = self.config.ramp_rate_days as usize;
        if days == 0 || history.len() < days {
            return None;
        }

        let past_ctl = history[history.len() - days].state.ctl;
        let weeks = Decimal::from(days as u64) / Decimal::from(7);
        Some((current_ctl - past_ctl) / weeks)
    }

    /// Training recommendations for the current state
    pub fn generate_recommendations(&self, point: &PmcPoint) -> Vec<String> {
        let mut recommendations = Vec::new();

        let interpretation = point.state.interpretation();
        recommendations.push(interpretation.recommendation().to_string());

        if let Some(ramp_rate) = point.ctl_ramp_rate {
            if ramp_rate > Decimal::from(8) {
                recommendations
                    .push("CTL ramp rate is aggressive - monitor for overreaching".to_string());
            } else if ramp_rate < Decimal::from(-5) {
                recommendations.push("CTL is declining rapidly".to_string());
            }
        }

        recommendations
    }
}

/// Date `days` before `date`, saturating at the minimum date
pub(crate) fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn daily_map(start: NaiveDate, loads: &[Decimal]) -> BTreeMap<NaiveDate, DailyLoad> {
        loads
            .iter()
            .enumerate()
            .map(|(i, load)| {
                let date = start + Days::new(i as u64);
                (
                    date,
                    DailyLoad {
                        date,
                        total_load: *load,
                        workout_count: 1,
                        workout_loads: vec![*load],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_single_step() {
        let calculator = PmcCalculator::new();
        let state = calculator.step(&TrainingLoadState::zero(), dec!(70));

        assert_eq!(state.atl, dec!(10));
        assert_eq!(state.ctl, dec!(70) / dec!(42));
        assert_eq!(state.tsb, state.ctl - state.atl);
    }

    #[test]
    fn test_zero_load_decays_toward_zero() {
        let calculator = PmcCalculator::new();
        let mut state = TrainingLoadState::new(dec!(80), dec!(120));
        let mut previous = state;

        for _ in 0..365 {
            state = calculator.step(&state, Decimal::ZERO);
            assert!(state.atl >= Decimal::ZERO);
            assert!(state.ctl >= Decimal::ZERO);
            assert!(state.atl <= previous.atl);
            assert!(state.ctl <= previous.ctl);
            assert_eq!(state.tsb, state.ctl - state.atl);
            previous = state;
        }

        assert!(state.atl < dec!(0.001));
        assert!(state.ctl < dec!(15));
    }

    #[test]
    fn test_update_with_elapsed_days() {
        let calculator = PmcCalculator::new();
        let start = TrainingLoadState::new(dec!(50), dec!(60));

        let manual = calculator.step(
            &calculator.step(&calculator.step(&start, Decimal::ZERO), Decimal::ZERO),
            dec!(90),
        );
        let updated = calculator.update(&start, dec!(90), 3);
        assert_eq!(manual, updated);

        // Zero elapsed days behaves as a single step
        assert_eq!(
            calculator.update(&start, dec!(90), 0),
            calculator.step(&start, dec!(90))
        );
    }

    #[test]
    fn test_negative_load_treated_as_zero() {
        let calculator = PmcCalculator::new();
        let start = TrainingLoadState::new(dec!(10), dec!(10));
        assert_eq!(
            calculator.step(&start, dec!(-50)),
            calculator.step(&start, Decimal::ZERO)
        );
    }

    #[test]
    fn test_series_fills_rest_days() {
        let calculator = PmcCalculator::new();
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let mut loads = daily_map(start, &[dec!(100)]);
        loads.extend(daily_map(start + Days::new(3), &[dec!(100)]));

        let series = calculator
            .series(&loads, start, start + Days::new(4), TrainingLoadState::zero())
            .unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series[1].daily_load, Decimal::ZERO);
        assert!(series[2].state.atl < series[0].state.atl);
        assert!(series[3].state.atl > series[2].state.atl);
        for point in &series {
            assert_eq!(point.state.tsb, point.state.ctl - point.state.atl);
        }
    }

    #[test]
    fn test_series_invalid_range() {
        let calculator = PmcCalculator::new();
        let start = NaiveDate::from_ymd_opt(2024, 9, 10).unwrap();
        let result = calculator.series(
            &BTreeMap::new(),
            start,
            start - Days::new(1),
            TrainingLoadState::zero(),
        );
        assert!(matches!(result, Err(PmcError::InvalidDateRange(_))));
    }

    #[test]
    fn test_ramp_rate_positive_with_progression() {
        let calculator = PmcCalculator::new();
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let loads: Vec<Decimal> = (0..21).map(|i| dec!(50) + Decimal::from(i * 3)).collect();
        let daily = daily_map(start, &loads);

        let series = calculator
            .series(&daily, start, start + Days::new(20), TrainingLoadState::zero())
            .unwrap();

        let last = series.last().unwrap();
        assert!(last.ctl_ramp_rate.unwrap() > Decimal::ZERO);
        assert!(series[0].ctl_ramp_rate.is_none());
    }

    #[test]
    fn test_state_as_of() {
        let calculator = PmcCalculator::new();
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let daily = daily_map(start, &[dec!(60), dec!(60), dec!(60)]);

        let state = calculator.state_as_of(&daily, start + Days::new(2));
        assert!(state.ctl > Decimal::ZERO);
        assert!(state.atl > state.ctl);
        assert!(state.tsb < Decimal::ZERO);

        // Before any workout the state is zero
        let before = calculator.state_as_of(&daily, start - Days::new(1));
        assert_eq!(before, TrainingLoadState::zero());
    }

    #[test]
    fn test_tsb_interpretation() {
        assert_eq!(TsbInterpretation::from_tsb(dec!(30)), TsbInterpretation::VeryFresh);
        assert_eq!(TsbInterpretation::from_tsb(dec!(10)), TsbInterpretation::Fresh);
        assert_eq!(TsbInterpretation::from_tsb(dec!(0)), TsbInterpretation::Neutral);
        assert_eq!(TsbInterpretation::from_tsb(dec!(-20)), TsbInterpretation::Fatigued);
        assert_eq!(TsbInterpretation::from_tsb(dec!(-40)), TsbInterpretation::VeryFatigued);
    }

    #[test]
    fn test_recommendations() {
        let calculator = PmcCalculator::new();
        let point = PmcPoint {
            date: NaiveDate::from_ymd_opt(2024, 9, 23).unwrap(),
            state: TrainingLoadState::new(dec!(40), dec!(75)),
            daily_load: dec!(120),
            ctl_ramp_rate: Some(dec!(9)),
        };

        let recommendations = calculator.generate_recommendations(&point);
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[0].contains("rest"));
    }

    #[test]
    fn test_config_validation() {
        let config = PmcConfig {
            atl_time_constant: 0,
            ..PmcConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PmcConfig::default().validate().is_ok());
    }
}
