//! Illness detection
//!
//! Scans a rolling window across five physiological signals for sustained
//! deviation from personal baselines and produces a point-in-time indicator.
//!
//! # Algorithm
//!
//! 1. For each signal take the last available value in the window and its
//!    baseline; signals with no value or an invalid baseline are skipped.
//! 2. A signal is abnormal when its deviation crosses that signal's own
//!    threshold (HRV drop, RHR rise, respiratory change in either direction,
//!    sleep-score drop, activity drop).
//! 3. With at least `min_signals` abnormal signals, an initial severity is
//!    set from how many times past its threshold the worst signal is, and an
//!    initial confidence from the count and severity. A lone High signal is
//!    reportable on its own.
//! 4. Confidence is boosted when the HRV or resting HR trend is consistent
//!    across the window, and again, scaled by count, when three or more
//!    signals co-occur. The result is clamped to [0, 1].
//! 5. The indicator is only reported at or above `min_confidence`.
//!
//! The whole computation is deterministic; identical inputs always give
//! identical output.

use crate::baseline::deviation_percent;
use crate::trend::{DeviationSide, TrendConsistencyAnalyzer, TrendDirection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Physiological signals watched for illness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Hrv,
    RestingHeartRate,
    RespiratoryRate,
    SleepScore,
    ActivityLevel,
}

impl SignalType {
    pub const ALL: [SignalType; 5] = [
        SignalType::Hrv,
        SignalType::RestingHeartRate,
        SignalType::RespiratoryRate,
        SignalType::SleepScore,
        SignalType::ActivityLevel,
    ];

    /// Which side of the baseline indicates illness
    pub fn abnormal_side(&self) -> DeviationSide {
        match self {
            SignalType::Hrv | SignalType::SleepScore | SignalType::ActivityLevel => {
                DeviationSide::Below
            }
            SignalType::RestingHeartRate => DeviationSide::Above,
            SignalType::RespiratoryRate => DeviationSide::Either,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Hrv => write!(f, "HRV"),
            SignalType::RestingHeartRate => write!(f, "Resting HR"),
            SignalType::RespiratoryRate => write!(f, "Respiratory Rate"),
            SignalType::SleepScore => write!(f, "Sleep Score"),
            SignalType::ActivityLevel => write!(f, "Activity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IllnessSeverity {
    Low,
    Moderate,
    High,
}

impl IllnessSeverity {
    pub fn recommendation(&self) -> &'static str {
        match self {
            IllnessSeverity::Low => {
                "Your body may be fighting something off. Consider an easier day and extra sleep."
            }
            IllnessSeverity::Moderate => {
                "Several signs point to illness. Skip intense training and focus on rest and hydration."
            }
            IllnessSeverity::High => {
                "Strong signs of illness. Rest today and consider seeking medical advice if symptoms persist."
            }
        }
    }
}

impl fmt::Display for IllnessSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllnessSeverity::Low => write!(f, "Low"),
            IllnessSeverity::Moderate => write!(f, "Moderate"),
            IllnessSeverity::High => write!(f, "High"),
        }
    }
}

/// One abnormal signal contributing to an indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub detected_value: f64,
    pub baseline: f64,
    /// Signed percentage deviation from baseline
    pub deviation_percent: f64,
    /// Trailing days beyond threshold
    pub consecutive_days: u32,
}

/// Reported illness indicator; only exists when confidence is high enough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllnessIndicator {
    pub date: NaiveDate,
    pub severity: IllnessSeverity,
    pub confidence: f64,
    pub signals: Vec<Signal>,
    pub recommendation: String,
}

/// Per-signal deviation thresholds in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllnessThresholds {
    pub hrv_drop_pct: f64,
    pub resting_hr_rise_pct: f64,
    pub respiratory_change_pct: f64,
    pub sleep_score_drop_pct: f64,
    pub activity_drop_pct: f64,
}

impl Default for IllnessThresholds {
    fn default() -> Self {
        IllnessThresholds {
            hrv_drop_pct: 10.0,
            resting_hr_rise_pct: 3.0,
            respiratory_change_pct: 8.0,
            sleep_score_drop_pct: 15.0,
            activity_drop_pct: 25.0,
        }
    }
}

impl IllnessThresholds {
    pub fn for_signal(&self, signal: SignalType) -> f64 {
        match signal {
            SignalType::Hrv => self.hrv_drop_pct,
            SignalType::RestingHeartRate => self.resting_hr_rise_pct,
            SignalType::RespiratoryRate => self.respiratory_change_pct,
            SignalType::SleepScore => self.sleep_score_drop_pct,
            SignalType::ActivityLevel => self.activity_drop_pct,
        }
    }
}

/// Detection and confidence heuristic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllnessConfig {
    pub thresholds: IllnessThresholds,

    /// Analysis window in days
    pub window_days: usize,

    /// Abnormal signals required for a candidate indicator
    pub min_signals: usize,

    /// Confidence required to report an indicator
    pub min_confidence: f64,

    pub base_confidence: f64,

    /// Added per abnormal signal beyond the first
    pub per_signal_confidence: f64,

    /// Worst deviation, as a multiple of its threshold, for Moderate
    pub moderate_excess_ratio: f64,

    /// Worst deviation, as a multiple of its threshold, for High
    pub high_excess_ratio: f64,

    pub moderate_severity_bonus: f64,
    pub high_severity_bonus: f64,

    /// HRV/RHR trend consistency above which the trend boost applies
    pub trend_consistency_threshold: f64,
    pub trend_boost: f64,

    /// Co-occurring signals needed for the multi-signal boost
    pub multi_signal_min: usize,

    /// Multi-signal boost per abnormal signal
    pub multi_signal_boost: f64,
}

impl Default for IllnessConfig {
    fn default() -> Self {
        IllnessConfig {
            thresholds: IllnessThresholds::default(),
            window_days: 7,
            min_signals: 1,
            min_confidence: 0.5,
            base_confidence: 0.35,
            per_signal_confidence: 0.1,
            moderate_excess_ratio: 3.0,
            high_excess_ratio: 6.0,
            moderate_severity_bonus: 0.05,
            high_severity_bonus: 0.15,
            trend_consistency_threshold: 0.7,
            trend_boost: 0.15,
            multi_signal_min: 3,
            multi_signal_boost: 0.05,
        }
    }
}

/// Daily values for one signal with its baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    /// Oldest first; `None` marks a missing day
    pub values: Vec<Option<f64>>,
    pub baseline: Option<f64>,
}

impl SignalSeries {
    pub fn new(values: Vec<Option<f64>>, baseline: Option<f64>) -> Self {
        SignalSeries { values, baseline }
    }
}

/// The window of data the engine inspects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllnessInputs {
    /// Date the detection is for (last day of the window)
    pub date: NaiveDate,
    pub hrv: SignalSeries,
    pub resting_hr: SignalSeries,
    pub respiratory_rate: SignalSeries,
    pub sleep_score: SignalSeries,
    pub activity: SignalSeries,
}

impl IllnessInputs {
    pub fn new(date: NaiveDate) -> Self {
        IllnessInputs {
            date,
            hrv: SignalSeries::default(),
            resting_hr: SignalSeries::default(),
            respiratory_rate: SignalSeries::default(),
            sleep_score: SignalSeries::default(),
            activity: SignalSeries::default(),
        }
    }

    pub fn series(&self, signal: SignalType) -> &SignalSeries {
        match signal {
            SignalType::Hrv => &self.hrv,
            SignalType::RestingHeartRate => &self.resting_hr,
            SignalType::RespiratoryRate => &self.respiratory_rate,
            SignalType::SleepScore => &self.sleep_score,
            SignalType::ActivityLevel => &self.activity,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IllnessDetectionEngine {
    config: IllnessConfig,
}

impl IllnessDetectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IllnessConfig) -> Self {
        IllnessDetectionEngine { config }
    }

    pub fn config(&self) -> &IllnessConfig {
        &self.config
    }

    /// Run detection for the window ending at `inputs.date`
    pub fn detect(&self, inputs: &IllnessInputs) -> Option<IllnessIndicator> {
        let signals: Vec<Signal> = SignalType::ALL
            .iter()
            .filter_map(|signal| self.evaluate_signal(*signal, inputs.series(*signal)))
            .collect();

        if signals.is_empty() || signals.len() < self.config.min_signals {
            debug!(
                date = %inputs.date,
                abnormal = signals.len(),
                "No illness candidate"
            );
            return None;
        }

        let severity = self.initial_severity(&signals);
        let hrv_consistency = self.trend_consistency(&inputs.hrv, TrendDirection::Decreasing);
        let rhr_consistency =
            self.trend_consistency(&inputs.resting_hr, TrendDirection::Increasing);
        let confidence = self.confidence(signals.len(), severity, hrv_consistency, rhr_consistency);

        if confidence < self.config.min_confidence {
            debug!(
                date = %inputs.date,
                confidence,
                "Illness candidate below confidence threshold"
            );
            return None;
        }

        info!(
            date = %inputs.date,
            severity = %severity,
            confidence,
            signals = signals.len(),
            "Illness indicator raised"
        );

        Some(IllnessIndicator {
            date: inputs.date,
            severity,
            confidence,
            signals,
            recommendation: severity.recommendation().to_string(),
        })
    }

    fn window<'a>(&self, series: &'a SignalSeries) -> &'a [Option<f64>] {
        let len = series.values.len();
        let start = len.saturating_sub(self.config.window_days.max(1));
        &series.values[start..]
    }

    fn evaluate_signal(&self, signal: SignalType, series: &SignalSeries) -> Option<Signal> {
        let window = self.window(series);
        let latest = window.iter().rev().flatten().next().copied()?;
        let baseline = series.baseline?;
        let deviation = deviation_percent(latest, baseline)?;
        let threshold = self.config.thresholds.for_signal(signal);
        let side = signal.abnormal_side();

        if !side.exceeds(deviation, threshold) {
            return None;
        }

        let trend =
            TrendConsistencyAnalyzer::consecutive_abnormal(window, baseline, threshold, side);

        debug!(
            signal = %signal,
            value = latest,
            baseline,
            deviation,
            consecutive_days = trend.consecutive_days,
            "Abnormal signal"
        );

        Some(Signal {
            signal_type: signal,
            detected_value: latest,
            baseline,
            deviation_percent: deviation,
            consecutive_days: trend.consecutive_days,
        })
    }

    /// Severity from the worst deviation as a multiple of its threshold
    fn initial_severity(&self, signals: &[Signal]) -> IllnessSeverity {
        let worst_ratio = signals
            .iter()
            .map(|s| {
                let threshold = self.config.thresholds.for_signal(s.signal_type);
                if threshold > 0.0 {
                    s.deviation_percent.abs() / threshold
                } else {
                    1.0
                }
            })
            .fold(0.0, f64::max);

        if worst_ratio >= self.config.high_excess_ratio {
            IllnessSeverity::High
        } else if worst_ratio >= self.config.moderate_excess_ratio {
            IllnessSeverity::Moderate
        } else {
            IllnessSeverity::Low
        }
    }

    fn trend_consistency(&self, series: &SignalSeries, direction: TrendDirection) -> f64 {
        TrendConsistencyAnalyzer::consistency_with_gaps(self.window(series), direction)
    }

    /// Deterministic confidence heuristic, clamped to [0, 1]
    pub fn confidence(
        &self,
        signal_count: usize,
        severity: IllnessSeverity,
        hrv_consistency: f64,
        rhr_consistency: f64,
    ) -> f64 {
        let config = &self.config;

        let mut confidence = config.base_confidence
            + config.per_signal_confidence * signal_count.saturating_sub(1) as f64;

        confidence += match severity {
            IllnessSeverity::Low => 0.0,
            IllnessSeverity::Moderate => config.moderate_severity_bonus,
            IllnessSeverity::High => config.high_severity_bonus,
        };

        if hrv_consistency > config.trend_consistency_threshold
            || rhr_consistency > config.trend_consistency_threshold
        {
            confidence += config.trend_boost;
        }

        if signal_count >= config.multi_signal_min {
            confidence += config.multi_signal_boost * signal_count as f64;
        }

        // Two decimals keeps threshold comparisons stable
        ((confidence * 100.0).round() / 100.0).clamp(0.0, 1.0)
    }
}
