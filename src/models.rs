use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Physiological metric kinds tracked on a daily basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    /// Heart rate variability (RMSSD or SDNN) in milliseconds
    Hrv,
    /// Resting heart rate in beats per minute
    RestingHeartRate,
    /// Respiratory rate in breaths per minute
    RespiratoryRate,
    /// Total sleep duration in hours
    SleepDuration,
    /// Externally computed sleep score (0-100)
    SleepScore,
    /// Daily step count
    Steps,
    /// Active energy in kilocalories
    ActiveEnergy,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Hrv,
        MetricKind::RestingHeartRate,
        MetricKind::RespiratoryRate,
        MetricKind::SleepDuration,
        MetricKind::SleepScore,
        MetricKind::Steps,
        MetricKind::ActiveEnergy,
    ];

    /// Canonical unit for this metric
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Hrv => "ms",
            MetricKind::RestingHeartRate => "bpm",
            MetricKind::RespiratoryRate => "breaths/min",
            MetricKind::SleepDuration => "h",
            MetricKind::SleepScore => "score",
            MetricKind::Steps => "count",
            MetricKind::ActiveEnergy => "kcal",
        }
    }

    /// Whether multiple samples on the same day are summed rather than averaged
    pub fn is_cumulative(&self) -> bool {
        matches!(self, MetricKind::Steps | MetricKind::ActiveEnergy)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Hrv => write!(f, "HRV"),
            MetricKind::RestingHeartRate => write!(f, "Resting HR"),
            MetricKind::RespiratoryRate => write!(f, "Respiratory Rate"),
            MetricKind::SleepDuration => write!(f, "Sleep Duration"),
            MetricKind::SleepScore => write!(f, "Sleep Score"),
            MetricKind::Steps => write!(f, "Steps"),
            MetricKind::ActiveEnergy => write!(f, "Active Energy"),
        }
    }
}

/// A single timestamped physiological reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric this sample measures
    pub kind: MetricKind,

    /// Measured value in the metric's unit
    pub value: f64,

    /// Unit label as reported by the source
    #[serde(default)]
    pub unit: String,

    /// When the sample was recorded, in the wearer's local offset
    pub timestamp: DateTime<FixedOffset>,

    /// Device or application that produced the sample
    #[serde(default)]
    pub source: Option<String>,
}

impl MetricSample {
    /// Create a sample using the metric's canonical unit
    pub fn new<Tz: TimeZone>(kind: MetricKind, value: f64, timestamp: DateTime<Tz>) -> Self {
        MetricSample {
            kind,
            value,
            unit: kind.unit().to_string(),
            timestamp: timestamp.fixed_offset(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Local calendar date the sample belongs to, matching workouts and sleep
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Daily aggregated value; `None` marks a day without data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Activity types reported by health stores and fitness platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Cycling,
    Running,
    Swimming,
    Rowing,
    Walking,
    Hiking,
    StrengthTraining,
    Hiit,
    Yoga,
    Other,
}

impl ActivityType {
    /// Cardio sessions carry power/HR load; the rest are scored through RPE
    pub fn is_cardio(&self) -> bool {
        !matches!(self, ActivityType::StrengthTraining | ActivityType::Yoga)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityType::Cycling => "Cycling",
            ActivityType::Running => "Running",
            ActivityType::Swimming => "Swimming",
            ActivityType::Rowing => "Rowing",
            ActivityType::Walking => "Walking",
            ActivityType::Hiking => "Hiking",
            ActivityType::StrengthTraining => "Strength Training",
            ActivityType::Hiit => "HIIT",
            ActivityType::Yoga => "Yoga",
            ActivityType::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

/// Muscle groups logged for strength sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Arms,
    Core,
    Legs,
    Glutes,
    FullBody,
}

/// Workout record as delivered by a data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    /// Unique identifier for the workout
    pub id: String,

    /// Local start time of the workout
    pub start: DateTime<FixedOffset>,

    /// Duration in seconds
    pub duration_seconds: u32,

    /// Activity type tag
    pub activity_type: ActivityType,

    /// Average power in watts
    #[serde(default)]
    pub average_power: Option<u16>,

    /// Normalized power in watts
    #[serde(default)]
    pub normalized_power: Option<u16>,

    /// Average heart rate in bpm
    #[serde(default)]
    pub average_heart_rate: Option<u16>,

    /// Training stress value computed by the source platform
    #[serde(default)]
    pub training_stress: Option<Decimal>,

    /// Session RPE (1-10), user-entered for strength sessions
    #[serde(default)]
    pub rpe: Option<f64>,

    /// Muscle groups trained (strength sessions)
    #[serde(default)]
    pub muscle_groups: Vec<MuscleGroup>,

    /// Platform or device identifier
    #[serde(default)]
    pub source: Option<String>,
}

impl WorkoutRecord {
    /// Local calendar date of the workout
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }
}

/// User physiological constants used by load estimation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPhysiology {
    /// Functional Threshold Power (watts)
    pub ftp: Option<u16>,

    /// Maximum heart rate (bpm)
    pub max_hr: Option<u16>,

    /// Resting heart rate (bpm)
    pub resting_hr: Option<u16>,

    /// Body mass in kilograms
    pub body_mass_kg: Option<f64>,
}

impl UserPhysiology {
    /// Fill unset values from `fallback`
    pub fn or(self, fallback: UserPhysiology) -> UserPhysiology {
        UserPhysiology {
            ftp: self.ftp.or(fallback.ftp),
            max_hr: self.max_hr.or(fallback.max_hr),
            resting_hr: self.resting_hr.or(fallback.resting_hr),
            body_mass_kg: self.body_mass_kg.or(fallback.body_mass_kg),
        }
    }
}

/// A completed sleep session with stage totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    /// Local time the user went to bed
    pub bedtime: DateTime<FixedOffset>,

    /// Local time the user woke up
    pub wake_time: DateTime<FixedOffset>,

    /// Deep sleep in minutes
    pub deep_minutes: u16,

    /// Light sleep in minutes
    pub light_minutes: u16,

    /// REM sleep in minutes
    pub rem_minutes: u16,

    /// Minutes awake between bedtime and wake time
    pub awake_minutes: u16,

    /// Number of wake periods during the night
    #[serde(default)]
    pub interruptions: Option<u8>,

    #[serde(default)]
    pub source: Option<String>,
}

impl SleepSession {
    /// Total sleep time in minutes (excludes awake time)
    pub fn total_sleep_minutes(&self) -> u32 {
        self.deep_minutes as u32 + self.light_minutes as u32 + self.rem_minutes as u32
    }

    pub fn total_sleep_hours(&self) -> f64 {
        self.total_sleep_minutes() as f64 / 60.0
    }

    /// Time in bed in minutes, falling back to stage totals when timestamps disagree
    pub fn time_in_bed_minutes(&self) -> u32 {
        let span = (self.wake_time - self.bedtime).num_minutes();
        let staged = self.total_sleep_minutes() + self.awake_minutes as u32;
        if span > 0 {
            (span as u32).max(staged)
        } else {
            staged
        }
    }

    /// The date a session is attributed to: the morning the user woke up
    pub fn night_of(&self) -> NaiveDate {
        self.wake_time.date_naive()
    }
}

/// Score types produced by the scoring engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreKind {
    Recovery,
    Sleep,
    Strain,
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreKind::Recovery => write!(f, "Recovery"),
            ScoreKind::Sleep => write!(f, "Sleep"),
            ScoreKind::Strain => write!(f, "Strain"),
        }
    }
}

/// Three-tier recovery scale
///
/// Tighter than the general display scale: 75-100 Optimal, 50-74 Good, below 50 Fair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryBand {
    Optimal,
    Good,
    Fair,
}

impl RecoveryBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => RecoveryBand::Optimal,
            50..=74 => RecoveryBand::Good,
            _ => RecoveryBand::Fair,
        }
    }
}

/// General-purpose four-band display scale used for sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WellnessBand {
    Optimal,
    Good,
    Fair,
    PayAttention,
}

impl WellnessBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => WellnessBand::Optimal,
            70..=84 => WellnessBand::Good,
            50..=69 => WellnessBand::Fair,
            _ => WellnessBand::PayAttention,
        }
    }
}

/// Load-magnitude scale for strain
///
/// Uses the recovery cut points but carries no health-quality meaning:
/// a light day is not a bad day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrainBand {
    High,
    Moderate,
    Light,
}

impl StrainBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => StrainBand::High,
            50..=74 => StrainBand::Moderate,
            _ => StrainBand::Light,
        }
    }
}

/// Band attached to a score result; each score kind keeps its own scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scale", content = "band")]
pub enum Band {
    Recovery(RecoveryBand),
    Wellness(WellnessBand),
    Strain(StrainBand),
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Recovery(RecoveryBand::Optimal) | Band::Wellness(WellnessBand::Optimal) => {
                write!(f, "Optimal")
            }
            Band::Recovery(RecoveryBand::Good) | Band::Wellness(WellnessBand::Good) => {
                write!(f, "Good")
            }
            Band::Recovery(RecoveryBand::Fair) | Band::Wellness(WellnessBand::Fair) => {
                write!(f, "Fair")
            }
            Band::Wellness(WellnessBand::PayAttention) => write!(f, "Pay Attention"),
            Band::Strain(StrainBand::High) => write!(f, "High"),
            Band::Strain(StrainBand::Moderate) => write!(f, "Moderate"),
            Band::Strain(StrainBand::Light) => write!(f, "Light"),
        }
    }
}

/// Immutable output of a scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Which engine produced the score
    pub kind: ScoreKind,

    /// Overall score (0-100)
    pub score: u8,

    /// Qualitative band on the engine's own scale
    pub band: Band,

    /// Named sub-scores (0-100) that contributed to the overall score
    pub sub_scores: BTreeMap<String, f64>,

    /// Snapshot of the exact inputs used
    pub inputs: serde_json::Value,

    /// Short explanation accompanying the score
    pub explanation: Option<String>,

    /// When the score was computed
    pub computed_at: DateTime<Utc>,
}

impl ScoreResult {
    pub fn sub_score(&self, name: &str) -> Option<f64> {
        self.sub_scores.get(name).copied()
    }
}

/// Convert a raw score to an integer in [0, 100]; non-finite input maps to 0
pub fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Weighted mean over the present components, renormalizing the weights
///
/// Returns `None` when no component is present or all present weights are zero.
pub fn renormalized_weighted_mean(components: &[(f64, Option<f64>)]) -> Option<f64> {
    let (weighted_sum, weight_total) = components
        .iter()
        .filter_map(|(weight, value)| value.map(|v| (*weight, v)))
        .filter(|(weight, value)| *weight > 0.0 && value.is_finite())
        .fold((0.0, 0.0), |(sum, total), (weight, value)| {
            (sum + weight * value, total + weight)
        });

    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        None
    }
}
