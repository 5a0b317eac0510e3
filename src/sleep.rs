//! Sleep score engine
//!
//! Scores a completed sleep session on a 0-100 scale from four components:
//!
//! 1. **Duration** (35%): total sleep against the target. The target is the
//!    configured sleep need, pulled halfway toward the personal baseline when
//!    one exists.
//! 2. **Efficiency** (25%): time asleep / time in bed, full marks at 90%.
//! 3. **Stages** (25%): deep sleep in 13-23% and REM in 20-25% of total sleep.
//! 4. **Continuity** (15%): up to two interruptions are free, each further
//!    interruption costs 12 points. Omitted when the source does not report it.
//!
//! Missing components renormalize the remaining weights. The result uses the
//! general four-band display scale.

use crate::baseline::Baseline;
use crate::models::{
    clamp_score, renormalized_weighted_mean, Band, ScoreKind, ScoreResult, SleepSession,
    WellnessBand,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Optimal deep sleep share of total sleep (percent)
const DEEP_OPTIMAL: (f64, f64) = (13.0, 23.0);

/// Optimal REM share of total sleep (percent)
const REM_OPTIMAL: (f64, f64) = (20.0, 25.0);

/// Efficiency at or above which the efficiency component is full
const EFFICIENCY_TARGET: f64 = 90.0;

/// Interruptions tolerated before the continuity penalty starts
const FREE_INTERRUPTIONS: u8 = 2;

const INTERRUPTION_PENALTY: f64 = 12.0;

/// Component weights for the sleep score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepWeights {
    pub duration: f64,
    pub efficiency: f64,
    pub stages: f64,
    pub continuity: f64,
}

impl Default for SleepWeights {
    fn default() -> Self {
        SleepWeights {
            duration: 0.35,
            efficiency: 0.25,
            stages: 0.25,
            continuity: 0.15,
        }
    }
}

/// Sleep engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Nightly sleep need in hours
    pub sleep_need_hours: f64,

    pub weights: SleepWeights,
}

impl Default for SleepConfig {
    fn default() -> Self {
        SleepConfig {
            sleep_need_hours: 8.0,
            weights: SleepWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SleepScoreEngine {
    config: SleepConfig,
}

impl SleepScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SleepConfig) -> Self {
        SleepScoreEngine { config }
    }

    /// Score one session; `None` when the session contains no sleep
    pub fn score(
        &self,
        session: &SleepSession,
        duration_baseline: Option<&Baseline>,
    ) -> Option<ScoreResult> {
        let total_minutes = session.total_sleep_minutes();
        if total_minutes == 0 {
            debug!(night = %session.night_of(), "Sleep session has no sleep time");
            return None;
        }

        let baseline_hours = duration_baseline.and_then(Baseline::usable_value);
        let target_hours = self.target_hours(baseline_hours);
        let weights = &self.config.weights;

        let duration = duration_score(session.total_sleep_hours(), target_hours);
        let efficiency_pct = total_minutes as f64 / session.time_in_bed_minutes() as f64 * 100.0;
        let efficiency = efficiency_score(efficiency_pct);
        let stages = stage_score(session);
        let continuity = session.interruptions.map(continuity_score);

        let combined = renormalized_weighted_mean(&[
            (weights.duration, Some(duration)),
            (weights.efficiency, Some(efficiency)),
            (weights.stages, Some(stages)),
            (weights.continuity, continuity),
        ])?;

        let mut sub_scores = BTreeMap::new();
        sub_scores.insert("duration".to_string(), duration);
        sub_scores.insert("efficiency".to_string(), efficiency);
        sub_scores.insert("stages".to_string(), stages);
        if let Some(continuity) = continuity {
            sub_scores.insert("continuity".to_string(), continuity);
        }

        let score = clamp_score(combined);
        debug!(night = %session.night_of(), score, "Sleep score computed");

        Some(ScoreResult {
            kind: ScoreKind::Sleep,
            score,
            band: Band::Wellness(WellnessBand::from_score(score)),
            sub_scores,
            inputs: json!({
                "night_of": session.night_of(),
                "total_sleep_minutes": total_minutes,
                "time_in_bed_minutes": session.time_in_bed_minutes(),
                "deep_minutes": session.deep_minutes,
                "light_minutes": session.light_minutes,
                "rem_minutes": session.rem_minutes,
                "awake_minutes": session.awake_minutes,
                "interruptions": session.interruptions,
                "sleep_need_hours": self.config.sleep_need_hours,
                "duration_baseline_hours": baseline_hours,
            }),
            explanation: Some(explanation(session, duration, efficiency_pct)),
            computed_at: Utc::now(),
        })
    }

    fn target_hours(&self, baseline_hours: Option<f64>) -> f64 {
        match baseline_hours {
            Some(baseline) => (self.config.sleep_need_hours + baseline) / 2.0,
            None => self.config.sleep_need_hours,
        }
    }
}

/// Full marks from the target up to 125% of it; linear below, gentle penalty above
fn duration_score(hours: f64, target_hours: f64) -> f64 {
    if target_hours <= 0.0 {
        return 100.0;
    }
    let ratio = hours / target_hours;
    if ratio < 1.0 {
        ratio * 100.0
    } else if ratio <= 1.25 {
        100.0
    } else {
        (100.0 - (ratio - 1.25) * 80.0).max(0.0)
    }
}

fn efficiency_score(efficiency_pct: f64) -> f64 {
    if efficiency_pct >= EFFICIENCY_TARGET {
        100.0
    } else {
        (efficiency_pct / EFFICIENCY_TARGET * 100.0).max(0.0)
    }
}

/// Deep and REM share each worth 50 points
fn stage_score(session: &SleepSession) -> f64 {
    let total = session.total_sleep_minutes() as f64;
    let deep_pct = session.deep_minutes as f64 / total * 100.0;
    let rem_pct = session.rem_minutes as f64 / total * 100.0;

    stage_component(deep_pct, DEEP_OPTIMAL) + stage_component(rem_pct, REM_OPTIMAL)
}

fn stage_component(pct: f64, (low, high): (f64, f64)) -> f64 {
    if pct < low {
        pct / low * 50.0
    } else if pct <= high {
        50.0
    } else {
        50.0 - ((pct - high) / 10.0 * 25.0).min(50.0)
    }
}

fn continuity_score(interruptions: u8) -> f64 {
    let extra = interruptions.saturating_sub(FREE_INTERRUPTIONS) as f64;
    (100.0 - extra * INTERRUPTION_PENALTY).max(0.0)
}

fn explanation(session: &SleepSession, duration: f64, efficiency_pct: f64) -> String {
    let total = session.total_sleep_minutes() as f64;
    if duration < 75.0 {
        format!(
            "Slept {:.1}h, short of your target",
            session.total_sleep_hours()
        )
    } else if efficiency_pct < 80.0 {
        format!("Restless night: {:.0}% of time in bed asleep", efficiency_pct)
    } else if (session.deep_minutes as f64 / total * 100.0) < DEEP_OPTIMAL.0 {
        "Low deep sleep share".to_string()
    } else {
        "Sleep duration and structure on target".to_string()
    }
}
