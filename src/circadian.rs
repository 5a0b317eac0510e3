//! Sleep-schedule consistency
//!
//! Bedtimes before 06:00 belong to the previous evening, so they are shifted
//! by +24h before averaging; a mean past 24h is folded back into [0, 24).
//! Wake times are averaged as-is.

use crate::models::{SleepSession, WorkoutRecord};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Bedtime hours below this are treated as after midnight
const WRAPAROUND_HOUR: f64 = 6.0;

/// Consistency points lost per minute of bedtime variance
const VARIANCE_PENALTY_PER_MINUTE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircadianRhythmData {
    /// Mean bedtime as a fractional hour in [0, 24)
    pub average_bedtime: f64,

    /// Mean wake time as a fractional hour in [0, 24)
    pub average_wake_time: f64,

    /// Standard deviation of bedtimes in minutes
    pub bedtime_variance_minutes: f64,

    /// Mean workout start time as a fractional hour
    pub average_training_time: Option<f64>,

    /// Overall schedule consistency (0-100)
    pub consistency_score: f64,

    pub session_count: usize,
}

impl CircadianRhythmData {
    /// Format a fractional hour as HH:MM
    pub fn format_hour(hour: f64) -> String {
        let total_minutes = (hour * 60.0).round() as i64;
        let total_minutes = total_minutes.rem_euclid(24 * 60);
        format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircadianRhythmAnalyzer;

impl CircadianRhythmAnalyzer {
    pub fn new() -> Self {
        CircadianRhythmAnalyzer
    }

    /// Summarize sessions that ended at or before `now`
    ///
    /// An externally computed `consistency_score` is clamped to [0, 100];
    /// without one the score is derived from bedtime variance.
    pub fn analyze(
        &self,
        sessions: &[SleepSession],
        workouts: &[WorkoutRecord],
        consistency_score: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<CircadianRhythmData> {
        let past: Vec<&SleepSession> = sessions
            .iter()
            .filter(|s| s.wake_time.with_timezone(&Utc) <= now)
            .collect();

        if past.is_empty() {
            debug!("No past sleep sessions for circadian analysis");
            return None;
        }

        let adjusted_bedtimes: Vec<f64> = past
            .iter()
            .map(|s| adjust_bedtime(fractional_hour(&s.bedtime)))
            .collect();
        let wake_times: Vec<f64> = past.iter().map(|s| fractional_hour(&s.wake_time)).collect();

        let mean_bedtime = adjusted_bedtimes.iter().mean();
        let bedtime_variance_minutes = if adjusted_bedtimes.len() > 1 {
            adjusted_bedtimes.iter().population_std_dev() * 60.0
        } else {
            0.0
        };

        let training_hours: Vec<f64> = workouts
            .iter()
            .filter(|w| w.start.with_timezone(&Utc) <= now)
            .map(|w| fractional_hour(&w.start))
            .collect();
        let average_training_time =
            (!training_hours.is_empty()).then(|| training_hours.iter().mean());

        Some(CircadianRhythmData {
            average_bedtime: normalize_hour(mean_bedtime),
            average_wake_time: wake_times.iter().mean(),
            bedtime_variance_minutes,
            average_training_time,
            consistency_score: match consistency_score {
                Some(score) if score.is_finite() => score.clamp(0.0, 100.0),
                Some(_) => 0.0,
                None => schedule_consistency_score(bedtime_variance_minutes),
            },
            session_count: past.len(),
        })
    }
}

/// Local time of day as a fractional hour
pub fn fractional_hour(time: &DateTime<FixedOffset>) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0
}

fn adjust_bedtime(hour: f64) -> f64 {
    if hour < WRAPAROUND_HOUR {
        hour + 24.0
    } else {
        hour
    }
}

fn normalize_hour(hour: f64) -> f64 {
    if hour >= 24.0 {
        hour - 24.0
    } else {
        hour
    }
}

/// Consistency score derived from bedtime variance alone
pub fn schedule_consistency_score(bedtime_variance_minutes: f64) -> f64 {
    (100.0 - bedtime_variance_minutes * VARIANCE_PENALTY_PER_MINUTE).clamp(0.0, 100.0)
}
