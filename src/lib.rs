// Library interface for vitalrs
// The CLI binary and integration tests both build on these modules

pub mod baseline;
pub mod circadian;
pub mod config;
pub mod error;
pub mod illness;
pub mod import;
pub mod load;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod pmc;
pub mod recovery;
pub mod sleep;
pub mod strain;
pub mod stress;
pub mod trend;

// Re-export commonly used types for convenience
pub use models::*;
pub use baseline::{Baseline, BaselineEstimator};
pub use circadian::{CircadianRhythmAnalyzer, CircadianRhythmData};
pub use config::AppConfig;
pub use error::{Result, VitalRsError};
pub use illness::{IllnessDetectionEngine, IllnessIndicator, IllnessSeverity};
pub use import::{FileDataProvider, ImportManager};
pub use load::{LoadEstimator, LoadMethod};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use pipeline::{HealthDataProvider, HealthDataset, HealthReport, Pipeline};
pub use pmc::{PmcCalculator, TrainingLoadState};
pub use recovery::RecoveryScoreEngine;
pub use sleep::SleepScoreEngine;
pub use strain::StrainScoreEngine;
pub use stress::StressSynthesizer;
pub use trend::TrendConsistencyAnalyzer;
