//! Rolling personal baselines
//!
//! A baseline is the arithmetic mean of the daily values inside a trailing
//! window. Missing days are excluded from both the sum and the count; nothing
//! is interpolated. A baseline built from fewer than `min_samples` days is
//! reported as absent rather than as an unreliable value.

use crate::models::{DailyValue, MetricKind, MetricSample};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Default trailing window in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Minimum number of present days for a baseline to exist
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Baseline estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Trailing window length in days (0 = use all available history)
    pub window_days: u32,

    /// Minimum present days required
    pub min_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            window_days: DEFAULT_WINDOW_DAYS,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Personal reference value for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Metric this baseline describes
    pub kind: MetricKind,

    /// Mean of the present daily values
    pub value: f64,

    /// Number of days that contributed
    pub sample_count: usize,

    /// Window length the baseline was computed over
    pub window_days: u32,
}

impl Baseline {
    /// A baseline can only be used as a divisor when it is positive and finite
    pub fn is_valid(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }

    /// Value usable for percentage deviations, `None` when invalid
    pub fn usable_value(&self) -> Option<f64> {
        self.is_valid().then_some(self.value)
    }

    /// Signed percentage deviation of `value` from this baseline
    pub fn deviation_percent(&self, value: f64) -> Option<f64> {
        deviation_percent(value, self.value)
    }
}

/// Signed percentage deviation `(value - baseline) / baseline * 100`
///
/// Non-positive or non-finite baselines yield `None`.
pub fn deviation_percent(value: f64, baseline: f64) -> Option<f64> {
    if !baseline.is_finite() || baseline <= 0.0 || !value.is_finite() {
        return None;
    }
    Some((value - baseline) / baseline * 100.0)
}

/// Computes baselines from daily aggregated samples
#[derive(Debug, Clone, Default)]
pub struct BaselineEstimator {
    config: BaselineConfig,
}

impl BaselineEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BaselineConfig) -> Self {
        BaselineEstimator { config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Aggregate raw samples of one metric into a contiguous daily series
    ///
    /// Averaged metrics use the daily mean; cumulative metrics (steps, active
    /// energy) use the daily sum. Days between the first and last sample with
    /// no data appear as gaps.
    pub fn aggregate_daily(samples: &[MetricSample], kind: MetricKind) -> Vec<DailyValue> {
        let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

        for sample in samples
            .iter()
            .filter(|s| s.kind == kind && s.value.is_finite())
        {
            let entry = by_day.entry(sample.date()).or_insert((0.0, 0));
            entry.0 += sample.value;
            entry.1 += 1;
        }

        let (first, last) = match (by_day.keys().next(), by_day.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Vec::new(),
        };

        first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| DailyValue {
                date,
                value: by_day.get(&date).map(|(sum, count)| {
                    if kind.is_cumulative() {
                        *sum
                    } else {
                        sum / *count as f64
                    }
                }),
            })
            .collect()
    }

    /// Baseline over an explicit sequence of daily values
    ///
    /// The window length is the length of the sequence; gaps are ignored.
    pub fn estimate_values(&self, kind: MetricKind, values: &[Option<f64>]) -> Option<Baseline> {
        let present: Vec<f64> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if present.len() < self.config.min_samples || present.is_empty() {
            debug!(
                metric = %kind,
                samples = present.len(),
                required = self.config.min_samples,
                "Baseline unavailable: not enough samples"
            );
            return None;
        }

        Some(Baseline {
            kind,
            value: present.iter().mean(),
            sample_count: present.len(),
            window_days: values.len() as u32,
        })
    }

    /// Baseline over the trailing window ending at `as_of` (inclusive)
    pub fn estimate(
        &self,
        kind: MetricKind,
        daily: &[DailyValue],
        as_of: NaiveDate,
    ) -> Option<Baseline> {
        let window_start = match self.config.window_days {
            0 => NaiveDate::MIN,
            days => as_of
                .checked_sub_days(Days::new(days as u64 - 1))
                .unwrap_or(NaiveDate::MIN),
        };

        let in_window: Vec<Option<f64>> = daily
            .iter()
            .filter(|d| d.date >= window_start && d.date <= as_of)
            .map(|d| d.value)
            .collect();

        let mut baseline = self.estimate_values(kind, &in_window)?;
        if self.config.window_days > 0 {
            baseline.window_days = self.config.window_days;
        }
        Some(baseline)
    }

    /// Baselines for every metric present in `samples`, over the window ending at `as_of`
    pub fn estimate_all(
        &self,
        samples: &[MetricSample],
        as_of: NaiveDate,
    ) -> HashMap<MetricKind, Baseline> {
        MetricKind::ALL
            .iter()
            .filter_map(|kind| {
                let daily = Self::aggregate_daily(samples, *kind);
                self.estimate(*kind, &daily, as_of)
                    .map(|baseline| (*kind, baseline))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(kind: MetricKind, value: f64, day: u32, hour: u32) -> MetricSample {
        MetricSample::new(
            kind,
            value,
            Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_mean_ignores_gaps() {
        let estimator = BaselineEstimator::new();
        let baseline = estimator
            .estimate_values(MetricKind::Hrv, &[Some(10.0), None, Some(20.0), Some(30.0)])
            .unwrap();

        assert!((baseline.value - 20.0).abs() < 1e-9);
        assert_eq!(baseline.sample_count, 3);
        assert_eq!(baseline.window_days, 4);
    }

    #[test]
    fn test_below_minimum_is_absent() {
        let estimator = BaselineEstimator::new();
        assert!(estimator
            .estimate_values(MetricKind::Hrv, &[Some(50.0), None, Some(52.0)])
            .is_none());
        assert!(estimator.estimate_values(MetricKind::Hrv, &[]).is_none());
    }

    #[test]
    fn test_zero_baseline_is_invalid_divisor() {
        let estimator = BaselineEstimator::new();
        let baseline = estimator
            .estimate_values(MetricKind::Steps, &[Some(0.0), Some(0.0), Some(0.0)])
            .unwrap();

        assert!(!baseline.is_valid());
        assert!(baseline.usable_value().is_none());
        assert!(baseline.deviation_percent(1000.0).is_none());
        assert!(deviation_percent(10.0, -5.0).is_none());
    }

    #[test]
    fn test_deviation_percent() {
        assert!((deviation_percent(45.0, 50.0).unwrap() + 10.0).abs() < 1e-9);
        assert!((deviation_percent(63.0, 60.0).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_daily_mean_and_gaps() {
        let samples = vec![
            sample(MetricKind::Hrv, 40.0, 1, 3),
            sample(MetricKind::Hrv, 60.0, 1, 5),
            sample(MetricKind::Hrv, 55.0, 3, 4),
            sample(MetricKind::RestingHeartRate, 52.0, 2, 6),
        ];

        let daily = BaselineEstimator::aggregate_daily(&samples, MetricKind::Hrv);
        assert_eq!(daily.len(), 3);
        assert_eq!(daily[0].value, Some(50.0));
        assert_eq!(daily[1].value, None);
        assert_eq!(daily[2].value, Some(55.0));
    }

    #[test]
    fn test_aggregate_daily_sums_cumulative_metrics() {
        let samples = vec![
            sample(MetricKind::Steps, 4000.0, 1, 10),
            sample(MetricKind::Steps, 6000.0, 1, 18),
        ];

        let daily = BaselineEstimator::aggregate_daily(&samples, MetricKind::Steps);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].value, Some(10000.0));
    }

    #[test]
    fn test_trailing_window() {
        let estimator = BaselineEstimator::with_config(BaselineConfig {
            window_days: 3,
            min_samples: 3,
        });
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let daily: Vec<DailyValue> = (0..5)
            .map(|i| DailyValue {
                date: start + Days::new(i),
                value: Some(10.0 * (i + 1) as f64),
            })
            .collect();

        // Window ending 2024-09-05 covers days 3..=5 -> 30, 40, 50
        let baseline = estimator
            .estimate(MetricKind::Hrv, &daily, NaiveDate::from_ymd_opt(2024, 9, 5).unwrap())
            .unwrap();
        assert!((baseline.value - 40.0).abs() < 1e-9);
        assert_eq!(baseline.window_days, 3);
    }

    #[test]
    fn test_unbounded_window_uses_all_history() {
        let estimator = BaselineEstimator::with_config(BaselineConfig {
            window_days: 0,
            min_samples: 3,
        });
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let daily: Vec<DailyValue> = (0..90)
            .map(|i| DailyValue {
                date: start + Days::new(i),
                value: if i % 30 == 0 { Some(60.0) } else { None },
            })
            .collect();

        let baseline = estimator
            .estimate(MetricKind::RestingHeartRate, &daily, start + Days::new(89))
            .unwrap();
        assert_eq!(baseline.sample_count, 3);
        assert!((baseline.value - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_all() {
        let samples: Vec<MetricSample> = (1..=5)
            .flat_map(|day| {
                vec![
                    sample(MetricKind::Hrv, 50.0, day, 4),
                    sample(MetricKind::RestingHeartRate, 55.0, day, 6),
                ]
            })
            .collect();

        let baselines = BaselineEstimator::new()
            .estimate_all(&samples, NaiveDate::from_ymd_opt(2024, 9, 5).unwrap());

        assert_eq!(baselines.len(), 2);
        assert!(baselines.contains_key(&MetricKind::Hrv));
        assert!(!baselines.contains_key(&MetricKind::Steps));
    }
}
