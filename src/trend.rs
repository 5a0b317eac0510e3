//! Multi-day trend consistency

use crate::baseline::deviation_percent;
use serde::{Deserialize, Serialize};

/// Expected direction of day-over-day movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

impl TrendDirection {
    /// Whether a day-over-day delta moves in this direction; a flat day does not
    fn matches(&self, delta: f64) -> bool {
        match self {
            TrendDirection::Increasing => delta > 0.0,
            TrendDirection::Decreasing => delta < 0.0,
        }
    }
}

/// Side of the baseline a value must fall on to count as abnormal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationSide {
    Above,
    Below,
    Either,
}

impl DeviationSide {
    pub fn exceeds(&self, deviation_pct: f64, threshold_pct: f64) -> bool {
        match self {
            DeviationSide::Above => deviation_pct >= threshold_pct,
            DeviationSide::Below => deviation_pct <= -threshold_pct,
            DeviationSide::Either => deviation_pct.abs() >= threshold_pct,
        }
    }
}

/// Trailing run of abnormal days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendResult {
    pub is_abnormal: bool,
    pub consecutive_days: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendConsistencyAnalyzer;

impl TrendConsistencyAnalyzer {
    /// Share of day-over-day transitions moving in `direction`
    ///
    /// Returns 0.0 for fewer than two values.
    pub fn consistency(values: &[f64], direction: TrendDirection) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }

        let transitions = values.len() - 1;
        let matching = values
            .windows(2)
            .filter(|pair| direction.matches(pair[1] - pair[0]))
            .count();

        matching as f64 / transitions as f64
    }

    /// Consistency over a series with gaps; missing days are skipped
    pub fn consistency_with_gaps(values: &[Option<f64>], direction: TrendDirection) -> f64 {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        Self::consistency(&present, direction)
    }

    /// Count trailing consecutive days deviating beyond `threshold_pct`
    ///
    /// Missing days at the end of the series are skipped; a gap inside the
    /// run ends it. An invalid baseline yields no abnormality.
    pub fn consecutive_abnormal(
        values: &[Option<f64>],
        baseline: f64,
        threshold_pct: f64,
        side: DeviationSide,
    ) -> TrendResult {
        let mut consecutive_days = 0;

        for value in values
            .iter()
            .rev()
            .skip_while(|v| v.is_none())
        {
            let exceeds = value
                .and_then(|v| deviation_percent(v, baseline))
                .map(|d| side.exceeds(d, threshold_pct))
                .unwrap_or(false);

            if !exceeds {
                break;
            }
            consecutive_days += 1;
        }

        TrendResult {
            is_abnormal: consecutive_days > 0,
            consecutive_days,
        }
    }
}
