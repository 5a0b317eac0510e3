//! Scatter/gather scoring pipeline
//!
//! Data is fetched from a [`HealthDataProvider`] concurrently, one request
//! per metric plus workouts, sleep and physiology. A failed request is logged
//! and treated as an empty source so the remaining scores still compute.
//! Scoring then runs on the blocking pool:
//!
//! 1. Daily series and per-night sleep scores (history included).
//! 2. Daily load and the PMC replay, alongside the sleep scores.
//! 3. Strain, illness and circadian analysis, in parallel.
//! 4. Recovery per window day, which reads the finished sleep score.
//! 5. Stress over the window from all of the above.

use crate::baseline::{Baseline, BaselineEstimator};
use crate::circadian::{CircadianRhythmAnalyzer, CircadianRhythmData};
use crate::config::AppConfig;
use crate::error::{Result, VitalRsError};
use crate::illness::{IllnessDetectionEngine, IllnessIndicator, IllnessInputs, SignalSeries};
use crate::load::{DailyLoad, LoadEstimator};
use crate::logging::log_error;
use crate::models::{
    clamp_score, DailyValue, MetricKind, MetricSample, ScoreResult, SleepSession,
    UserPhysiology, WorkoutRecord,
};
use crate::pmc::{days_before, PmcCalculator, TrainingLoadState};
use crate::recovery::{overnight_hrv, RecoveryInputs, RecoveryScoreEngine};
use crate::sleep::SleepScoreEngine;
use crate::strain::{StrainInputs, StrainScoreEngine};
use crate::stress::{StressInputs, StressPoint, StressSynthesizer};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Days of strain summed into recovery's load context
const STRAIN_LOOKBACK_DAYS: u64 = 7;

/// Source of raw health data
///
/// Ranges are half-open: `start` inclusive, `end` exclusive.
#[async_trait]
pub trait HealthDataProvider: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    async fn fetch_samples(
        &self,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>>;

    async fn fetch_workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkoutRecord>>;

    async fn fetch_sleep_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SleepSession>>;

    async fn fetch_physiology(&self) -> Result<UserPhysiology>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Days of history fetched before the report date
    pub history_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig { history_days: 60 }
    }
}

/// Everything the scoring stage reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthDataset {
    pub physiology: UserPhysiology,
    pub samples: Vec<MetricSample>,
    pub workouts: Vec<WorkoutRecord>,
    pub sleep_sessions: Vec<SleepSession>,
}

impl HealthDataset {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.workouts.is_empty() && self.sleep_sessions.is_empty()
    }

    /// Append another dataset; physiology already set here takes precedence
    pub fn merge(&mut self, other: HealthDataset) {
        self.physiology = self.physiology.clone().or(other.physiology);
        self.samples.extend(other.samples);
        self.workouts.extend(other.workouts);
        self.sleep_sessions.extend(other.sleep_sessions);
    }
}

/// Scores for one day; any part may be absent when its data is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub as_of: NaiveDate,
    pub recovery: Option<ScoreResult>,
    pub sleep: Option<ScoreResult>,
    pub strain: Option<ScoreResult>,
    pub illness: Option<IllnessIndicator>,
    /// Daily stress over the analysis window
    pub stress: Vec<StressPoint>,
    pub circadian: Option<CircadianRhythmData>,
    pub training_load: Option<TrainingLoadState>,
    /// Personal baselines going into the day
    pub baselines: BTreeMap<MetricKind, Baseline>,
}

impl HealthReport {
    pub fn empty(as_of: NaiveDate) -> Self {
        HealthReport {
            as_of,
            recovery: None,
            sleep: None,
            strain: None,
            illness: None,
            stress: Vec::new(),
            circadian: None,
            training_load: None,
            baselines: BTreeMap::new(),
        }
    }

    /// True when no score could be produced
    pub fn is_empty(&self) -> bool {
        self.recovery.is_none()
            && self.sleep.is_none()
            && self.strain.is_none()
            && self.illness.is_none()
            && self.stress.is_empty()
            && self.circadian.is_none()
            && self.training_load.is_none()
    }
}

type DailySeries = BTreeMap<MetricKind, BTreeMap<NaiveDate, f64>>;

/// Engines wired together with one configuration
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    physiology: UserPhysiology,
    baseline: BaselineEstimator,
    load: LoadEstimator,
    pmc: PmcCalculator,
    sleep: SleepScoreEngine,
    recovery: RecoveryScoreEngine,
    strain: StrainScoreEngine,
    illness: IllnessDetectionEngine,
    stress: StressSynthesizer,
    circadian: CircadianRhythmAnalyzer,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Pipeline {
            config: config.pipeline.clone(),
            physiology: config.physiology.clone(),
            baseline: BaselineEstimator::with_config(config.baseline.clone()),
            load: LoadEstimator::with_config(config.load.clone()),
            pmc: PmcCalculator::with_config(config.pmc.clone()),
            sleep: SleepScoreEngine::with_config(config.sleep.clone()),
            recovery: RecoveryScoreEngine::with_config(config.recovery.clone()),
            strain: StrainScoreEngine::with_config(config.strain.clone()),
            illness: IllnessDetectionEngine::with_config(config.illness.clone()),
            stress: StressSynthesizer::with_weights(config.stress.clone()),
            circadian: CircadianRhythmAnalyzer::new(),
        }
    }

    /// Fetch and score in one go
    #[instrument(skip_all, fields(as_of = %as_of, source = provider.name()))]
    pub async fn run<P>(&self, provider: &P, as_of: NaiveDate) -> Result<HealthReport>
    where
        P: HealthDataProvider + ?Sized,
    {
        let data = self.gather(provider, as_of).await;
        let pipeline = self.clone();

        tokio::task::spawn_blocking(move || pipeline.compute(&data, as_of))
            .await
            .map_err(|e| VitalRsError::Internal(format!("Scoring task failed: {}", e)))
    }

    /// Fetch the history window for `as_of` concurrently
    ///
    /// Never fails; a source that errors contributes nothing.
    pub async fn gather<P>(&self, provider: &P, as_of: NaiveDate) -> HealthDataset
    where
        P: HealthDataProvider + ?Sized,
    {
        let start = day_start(days_before(as_of, self.config.history_days as u64));
        let end = day_end(as_of);
        let source = provider.name();

        let (hrv, rhr, respiratory, sleep_duration, sleep_score, steps, energy) = tokio::join!(
            provider.fetch_samples(MetricKind::Hrv, start, end),
            provider.fetch_samples(MetricKind::RestingHeartRate, start, end),
            provider.fetch_samples(MetricKind::RespiratoryRate, start, end),
            provider.fetch_samples(MetricKind::SleepDuration, start, end),
            provider.fetch_samples(MetricKind::SleepScore, start, end),
            provider.fetch_samples(MetricKind::Steps, start, end),
            provider.fetch_samples(MetricKind::ActiveEnergy, start, end),
        );
        let (workouts, sleep_sessions, physiology) = tokio::join!(
            provider.fetch_workouts(start, end),
            provider.fetch_sleep_sessions(start, end),
            provider.fetch_physiology(),
        );

        let mut samples = Vec::new();
        for (kind, result) in [
            (MetricKind::Hrv, hrv),
            (MetricKind::RestingHeartRate, rhr),
            (MetricKind::RespiratoryRate, respiratory),
            (MetricKind::SleepDuration, sleep_duration),
            (MetricKind::SleepScore, sleep_score),
            (MetricKind::Steps, steps),
            (MetricKind::ActiveEnergy, energy),
        ] {
            samples.extend(or_empty(source, &kind.to_string(), result));
        }

        let data = HealthDataset {
            physiology: or_empty(source, "physiology", physiology).or(self.physiology.clone()),
            samples,
            workouts: or_empty(source, "workouts", workouts),
            sleep_sessions: or_empty(source, "sleep sessions", sleep_sessions),
        };

        info!(
            source,
            samples = data.samples.len(),
            workouts = data.workouts.len(),
            sleep_sessions = data.sleep_sessions.len(),
            "Gathered health data"
        );

        data
    }

    /// Score a dataset for `as_of`
    pub fn compute(&self, data: &HealthDataset, as_of: NaiveDate) -> HealthReport {
        if data.is_empty() {
            debug!(%as_of, "Empty dataset, nothing to score");
            return HealthReport::empty(as_of);
        }

        let window_len = self.illness.config().window_days.max(1) as u64;
        let window: Vec<NaiveDate> = (0..window_len)
            .rev()
            .map(|offset| days_before(as_of, offset))
            .collect();
        let strain_days: Vec<NaiveDate> = (0..window_len + STRAIN_LOOKBACK_DAYS)
            .rev()
            .map(|offset| days_before(as_of, offset))
            .collect();

        let mut series: DailySeries = MetricKind::ALL
            .par_iter()
            .map(|kind| (*kind, daily_map(&data.samples, *kind)))
            .collect();

        let nights = nights_by_date(&data.sleep_sessions);
        let durations = series.entry(MetricKind::SleepDuration).or_default();
        for (date, session) in &nights {
            if session.total_sleep_minutes() > 0 {
                durations.entry(*date).or_insert(session.total_sleep_hours());
            }
        }

        let (sleep_scores, (daily_loads, pmc_states)) = rayon::join(
            || self.score_nights(&nights, &series),
            || {
                let daily_loads = self.load.daily_loads(&data.workouts, &data.physiology);
                let states = self.pmc_states(&daily_loads, as_of);
                (daily_loads, states)
            },
        );

        series
            .entry(MetricKind::SleepScore)
            .or_default()
            .extend(sleep_scores.iter().map(|(date, r)| (*date, r.score as f64)));

        let (strain_scores, (illness, circadian)) = rayon::join(
            || {
                strain_days
                    .par_iter()
                    .filter_map(|date| self.strain_for(*date, data, &series).map(|r| (*date, r)))
                    .collect::<BTreeMap<NaiveDate, ScoreResult>>()
            },
            || {
                rayon::join(
                    || self.illness.detect(&self.illness_inputs(&series, &window)),
                    || {
                        self.circadian
                            .analyze(&data.sleep_sessions, &data.workouts, None, day_end(as_of))
                    },
                )
            },
        );

        let recoveries: BTreeMap<NaiveDate, ScoreResult> = window
            .par_iter()
            .filter_map(|date| {
                let ill = *date == as_of && illness.is_some();
                let inputs = self.recovery_inputs(
                    *date,
                    data,
                    &series,
                    &nights,
                    &strain_scores,
                    &pmc_states,
                    ill,
                );
                self.recovery.score(&inputs).map(|r| (*date, r))
            })
            .collect();

        let stress = self.stress.synthesize(&self.stress_inputs(
            &window,
            &series,
            &recoveries,
            &daily_loads,
        ));

        let baselines = self
            .baselines_at(&series, days_before(as_of, 1))
            .into_iter()
            .collect();

        let report = HealthReport {
            as_of,
            recovery: recoveries.get(&as_of).cloned(),
            sleep: sleep_scores.get(&as_of).cloned(),
            strain: strain_scores.get(&as_of).cloned(),
            illness,
            stress,
            circadian,
            training_load: pmc_states.get(&as_of).copied(),
            baselines,
        };

        info!(
            %as_of,
            recovery = ?report.recovery.as_ref().map(|r| r.score),
            sleep = ?report.sleep.as_ref().map(|r| r.score),
            strain = ?report.strain.as_ref().map(|r| r.score),
            illness = report.illness.is_some(),
            "Computed health report"
        );

        report
    }

    fn baseline_for(
        &self,
        series: &DailySeries,
        kind: MetricKind,
        as_of: NaiveDate,
    ) -> Option<Baseline> {
        let daily: Vec<DailyValue> = series
            .get(&kind)?
            .range(..=as_of)
            .map(|(date, value)| DailyValue {
                date: *date,
                value: Some(*value),
            })
            .collect();
        self.baseline.estimate(kind, &daily, as_of)
    }

    fn baselines_at(&self, series: &DailySeries, as_of: NaiveDate) -> Vec<(MetricKind, Baseline)> {
        MetricKind::ALL
            .iter()
            .filter_map(|kind| self.baseline_for(series, *kind, as_of).map(|b| (*kind, b)))
            .collect()
    }

    fn baseline_value(
        &self,
        series: &DailySeries,
        kind: MetricKind,
        as_of: NaiveDate,
    ) -> Option<f64> {
        self.baseline_for(series, kind, as_of)
            .and_then(|b| b.usable_value())
    }

    /// Sleep scores for every night, each against the duration baseline before it
    fn score_nights(
        &self,
        nights: &BTreeMap<NaiveDate, &SleepSession>,
        series: &DailySeries,
    ) -> BTreeMap<NaiveDate, ScoreResult> {
        nights
            .par_iter()
            .filter_map(|(date, session)| {
                let baseline =
                    self.baseline_for(series, MetricKind::SleepDuration, days_before(*date, 1));
                self.sleep
                    .score(session, baseline.as_ref())
                    .map(|result| (*date, result))
            })
            .collect()
    }

    fn pmc_states(
        &self,
        daily_loads: &BTreeMap<NaiveDate, DailyLoad>,
        as_of: NaiveDate,
    ) -> BTreeMap<NaiveDate, TrainingLoadState> {
        let first = match daily_loads.keys().next() {
            Some(first) if *first <= as_of => *first,
            _ => return BTreeMap::new(),
        };

        match self
            .pmc
            .series(daily_loads, first, as_of, TrainingLoadState::zero())
        {
            Ok(points) => points.into_iter().map(|p| (p.date, p.state)).collect(),
            Err(e) => {
                debug!(error = %e, "PMC replay skipped");
                BTreeMap::new()
            }
        }
    }

    /// Strain for one day; `None` with no workouts and no activity metrics
    fn strain_for(
        &self,
        date: NaiveDate,
        data: &HealthDataset,
        series: &DailySeries,
    ) -> Option<ScoreResult> {
        let value = |kind: MetricKind| series.get(&kind).and_then(|m| m.get(&date)).copied();
        let steps = value(MetricKind::Steps);
        let active_energy_kcal = value(MetricKind::ActiveEnergy);
        let has_workouts = data.workouts.iter().any(|w| w.date() == date);

        if !has_workouts && steps.is_none() && active_energy_kcal.is_none() {
            return None;
        }

        let previous = days_before(date, 1);
        let inputs = StrainInputs {
            steps,
            active_energy_kcal,
            hrv: value(MetricKind::Hrv),
            hrv_baseline: self.baseline_value(series, MetricKind::Hrv, previous),
            resting_hr: value(MetricKind::RestingHeartRate),
            resting_hr_baseline: self.baseline_value(
                series,
                MetricKind::RestingHeartRate,
                previous,
            ),
            sleep_score: value(MetricKind::SleepScore).map(clamp_score),
            ..StrainInputs::from_workouts(date, &data.workouts, &self.load, &data.physiology)
        };

        self.strain.score(&inputs)
    }

    /// Window series for the five illness signals, against baselines ending the day before the window
    fn illness_inputs(&self, series: &DailySeries, window: &[NaiveDate]) -> IllnessInputs {
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return IllnessInputs::new(NaiveDate::MIN),
        };
        let baseline_date = days_before(first, 1);

        let signal = |kind: MetricKind| {
            let values = window
                .iter()
                .map(|date| series.get(&kind).and_then(|m| m.get(date)).copied())
                .collect();
            let baseline = self
                .baseline_for(series, kind, baseline_date)
                .map(|b| b.value);
            SignalSeries::new(values, baseline)
        };

        IllnessInputs {
            hrv: signal(MetricKind::Hrv),
            resting_hr: signal(MetricKind::RestingHeartRate),
            respiratory_rate: signal(MetricKind::RespiratoryRate),
            sleep_score: signal(MetricKind::SleepScore),
            activity: signal(MetricKind::Steps),
            ..IllnessInputs::new(last)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn recovery_inputs(
        &self,
        date: NaiveDate,
        data: &HealthDataset,
        series: &DailySeries,
        nights: &BTreeMap<NaiveDate, &SleepSession>,
        strain_scores: &BTreeMap<NaiveDate, ScoreResult>,
        pmc_states: &BTreeMap<NaiveDate, TrainingLoadState>,
        illness_present: bool,
    ) -> RecoveryInputs {
        let value = |kind: MetricKind| series.get(&kind).and_then(|m| m.get(&date)).copied();
        let previous = days_before(date, 1);
        let session = nights.get(&date).copied();
        let training = pmc_states.get(&previous);

        let recent_strain: Vec<f64> = strain_scores
            .range(days_before(date, STRAIN_LOOKBACK_DAYS)..date)
            .map(|(_, r)| r.score as f64)
            .collect();

        let sleep_duration_hours = value(MetricKind::SleepDuration);

        RecoveryInputs {
            current_hrv: value(MetricKind::Hrv),
            overnight_hrv: session.and_then(|s| overnight_hrv(&data.samples, s)),
            hrv_baseline: self.baseline_value(series, MetricKind::Hrv, previous),
            resting_hr: value(MetricKind::RestingHeartRate),
            resting_hr_baseline: self.baseline_value(
                series,
                MetricKind::RestingHeartRate,
                previous,
            ),
            sleep_duration_hours,
            sleep_duration_baseline: self.baseline_value(
                series,
                MetricKind::SleepDuration,
                previous,
            ),
            respiratory_rate: value(MetricKind::RespiratoryRate),
            respiratory_rate_baseline: self.baseline_value(
                series,
                MetricKind::RespiratoryRate,
                previous,
            ),
            atl: training.map(|t| t.atl),
            ctl: training.map(|t| t.ctl),
            seven_day_strain: (!recent_strain.is_empty()).then(|| recent_strain.iter().sum()),
            sleep_score: value(MetricKind::SleepScore).map(clamp_score),
            illness_present,
            sleep_data_present: session.is_some() || sleep_duration_hours.is_some(),
        }
    }

    fn stress_inputs(
        &self,
        window: &[NaiveDate],
        series: &DailySeries,
        recoveries: &BTreeMap<NaiveDate, ScoreResult>,
        daily_loads: &BTreeMap<NaiveDate, DailyLoad>,
    ) -> StressInputs {
        let mut inputs = StressInputs {
            hrv_baseline: window.first().and_then(|first| {
                self.baseline_value(series, MetricKind::Hrv, days_before(*first, 1))
            }),
            ..StressInputs::default()
        };

        let in_window = |kind: MetricKind| -> BTreeMap<NaiveDate, f64> {
            window
                .iter()
                .filter_map(|d| series.get(&kind).and_then(|m| m.get(d)).map(|v| (*d, *v)))
                .collect()
        };

        inputs.hrv = in_window(MetricKind::Hrv);
        inputs.resting_hr = in_window(MetricKind::RestingHeartRate);
        inputs.sleep = in_window(MetricKind::SleepScore);
        for date in window {
            if let Some(recovery) = recoveries.get(date) {
                inputs.recovery.insert(*date, recovery.score as f64);
            }
            if let Some(load) = daily_loads.get(date).and_then(|d| d.total_load.to_f64()) {
                inputs.load.insert(*date, load);
            }
        }

        inputs
    }
}

fn or_empty<T: Default>(source: &str, what: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        log_error(&format!("fetching {} from {}", what, source), &e);
        T::default()
    })
}

fn daily_map(samples: &[MetricSample], kind: MetricKind) -> BTreeMap<NaiveDate, f64> {
    BaselineEstimator::aggregate_daily(samples, kind)
        .into_iter()
        .filter_map(|d| d.value.map(|v| (d.date, v)))
        .collect()
}

/// Longest session per wake date
fn nights_by_date(sessions: &[SleepSession]) -> BTreeMap<NaiveDate, &SleepSession> {
    let mut nights: BTreeMap<NaiveDate, &SleepSession> = BTreeMap::new();
    for session in sessions {
        nights
            .entry(session.night_of())
            .and_modify(|current| {
                if session.total_sleep_minutes() > current.total_sleep_minutes() {
                    *current = session;
                }
            })
            .or_insert(session);
    }
    nights
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date.checked_add_days(Days::new(1)).unwrap_or(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::ActivityType;
    use chrono::{Duration, FixedOffset, TimeZone};

    struct FailingProvider;

    #[async_trait]
    impl HealthDataProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_samples(
            &self,
            _kind: MetricKind,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<MetricSample>> {
            Err(ProviderError::Unavailable {
                source_name: "failing".to_string(),
            }
            .into())
        }

        async fn fetch_workouts(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<WorkoutRecord>> {
            Err(ProviderError::Timeout {
                source_name: "failing".to_string(),
            }
            .into())
        }

        async fn fetch_sleep_sessions(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<SleepSession>> {
            Ok(Vec::new())
        }

        async fn fetch_physiology(&self) -> Result<UserPhysiology> {
            Ok(UserPhysiology::default())
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    /// Steady daily data ending on `as_of`, with a run every other day
    fn create_test_dataset(days: u64) -> HealthDataset {
        let utc = FixedOffset::east_opt(0).unwrap();
        let mut data = HealthDataset {
            physiology: UserPhysiology {
                ftp: None,
                max_hr: Some(190),
                resting_hr: Some(50),
                body_mass_kg: None,
            },
            ..Default::default()
        };

        for offset in 0..days {
            let date = days_before(as_of(), offset);
            let at = |hour: u32| date.and_hms_opt(hour, 0, 0).unwrap().and_utc();

            data.samples.push(MetricSample::new(MetricKind::Hrv, 60.0, at(4)));
            data.samples
                .push(MetricSample::new(MetricKind::RestingHeartRate, 52.0, at(6)));
            data.samples
                .push(MetricSample::new(MetricKind::RespiratoryRate, 14.0, at(6)));
            data.samples
                .push(MetricSample::new(MetricKind::Steps, 8000.0, at(20)));

            let wake = utc.from_utc_datetime(&at(7).naive_utc());
            data.sleep_sessions.push(SleepSession {
                bedtime: wake - Duration::hours(8),
                wake_time: wake,
                deep_minutes: 90,
                light_minutes: 250,
                rem_minutes: 100,
                awake_minutes: 40,
                interruptions: Some(1),
                source: None,
            });

            if offset % 2 == 1 {
                data.workouts.push(WorkoutRecord {
                    id: format!("run-{}", offset),
                    start: utc.from_utc_datetime(&at(18).naive_utc()),
                    duration_seconds: 3600,
                    activity_type: ActivityType::Running,
                    average_power: None,
                    normalized_power: None,
                    average_heart_rate: Some(140),
                    training_stress: None,
                    rpe: None,
                    muscle_groups: vec![],
                    source: None,
                });
            }
        }

        data
    }

    #[test]
    fn test_empty_dataset_gives_empty_report() {
        let report = Pipeline::new().compute(&HealthDataset::default(), as_of());
        assert!(report.is_empty());
        assert!(report.baselines.is_empty());
        assert_eq!(report.as_of, as_of());
    }

    #[tokio::test]
    async fn test_failing_sources_degrade_to_absence() {
        let report = Pipeline::new().run(&FailingProvider, as_of()).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_gather_merges_configured_physiology() {
        let mut config = AppConfig::default();
        config.physiology.max_hr = Some(185);
        let data = Pipeline::from_config(&config)
            .gather(&FailingProvider, as_of())
            .await;
        assert_eq!(data.physiology.max_hr, Some(185));
        assert!(data.samples.is_empty());
    }

    #[test]
    fn test_steady_data_scores_every_part() {
        let data = create_test_dataset(40);
        let report = Pipeline::new().compute(&data, as_of());

        assert!(report.recovery.is_some());
        assert!(report.sleep.is_some());
        assert!(report.strain.is_some());
        assert!(report.illness.is_none());
        assert!(report.circadian.is_some());
        assert!(!report.stress.is_empty());

        let training = report.training_load.unwrap();
        assert_eq!(training.tsb, training.ctl - training.atl);

        let hrv = &report.baselines[&MetricKind::Hrv];
        assert!((hrv.value - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovery_reads_finished_sleep_score() {
        let data = create_test_dataset(40);
        let report = Pipeline::new().compute(&data, as_of());

        let sleep = report.sleep.unwrap();
        let recovery = report.recovery.unwrap();
        assert_eq!(recovery.sub_score("sleep"), Some(sleep.score as f64));
    }

    #[test]
    fn test_no_workouts_means_no_training_load() {
        let mut data = create_test_dataset(20);
        data.workouts.clear();
        let report = Pipeline::new().compute(&data, as_of());
        assert!(report.training_load.is_none());
        assert!(report.recovery.is_some());
    }

    #[test]
    fn test_hrv_decline_surfaces_illness() {
        let mut data = create_test_dataset(40);
        for sample in data.samples.iter_mut() {
            let days_ago = (as_of() - sample.date()).num_days();
            if sample.kind == MetricKind::Hrv && days_ago < 7 {
                sample.value = 60.0 - 4.0 * (7 - days_ago) as f64;
            }
        }

        let report = Pipeline::new().compute(&data, as_of());
        let illness = report.illness.expect("illness indicator");
        assert!(illness.confidence >= 0.5);
        assert!(report
            .recovery
            .unwrap()
            .explanation
            .unwrap_or_default()
            .to_lowercase()
            .contains("illness"));
    }
}
