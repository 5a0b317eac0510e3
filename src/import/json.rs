use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::pipeline::HealthDataset;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Full dataset export: physiology, samples, workouts and sleep sessions
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        JsonImporter
    }

    /// Parse a dataset from a JSON string
    pub fn parse_str(content: &str) -> Result<HealthDataset> {
        let dataset: HealthDataset =
            serde_json::from_str(content).map_err(|e| ImportError::ParseError {
                format: "JSON".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::normalize(dataset))
    }

    /// Fill units the export left out and drop non-finite readings
    fn normalize(mut dataset: HealthDataset) -> HealthDataset {
        let before = dataset.samples.len();
        dataset.samples.retain(|s| s.value.is_finite());
        for sample in dataset.samples.iter_mut().filter(|s| s.unit.is_empty()) {
            sample.unit = sample.kind.unit().to_string();
        }

        if dataset.samples.len() < before {
            debug!(
                dropped = before - dataset.samples.len(),
                "Dropped non-finite samples"
            );
        }
        dataset
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }

    fn import_file(&self, file_path: &Path) -> Result<HealthDataset> {
        let content = fs::read_to_string(file_path)?;
        Self::parse_str(&content)
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
