use crate::error::{ImportError, Result};
use crate::models::{MetricKind, MetricSample, SleepSession, UserPhysiology, WorkoutRecord};
use crate::pipeline::{HealthDataProvider, HealthDataset};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod csv;
pub mod json;

/// Trait for reading exported health data in different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read the whole file into a dataset
    fn import_file(&self, file_path: &Path) -> Result<HealthDataset>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(json::JsonImporter::new()),
            Box::new(csv::CsvImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<HealthDataset> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            })?;

        let dataset = importer.import_file(file_path)?;
        info!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            samples = dataset.samples.len(),
            workouts = dataset.workouts.len(),
            sleep_sessions = dataset.sleep_sessions.len(),
            "Imported dataset"
        );

        Ok(dataset)
    }

    /// Import and merge several files or directories
    ///
    /// Physiology from earlier files wins over later ones.
    pub fn import_files(&self, file_paths: &[PathBuf]) -> Result<HealthDataset> {
        let mut dataset = HealthDataset::default();
        for path in file_paths {
            let imported = if path.is_dir() {
                self.import_directory(path)?
            } else {
                self.import_file(path)?
            };
            dataset.merge(imported);
        }
        Ok(dataset)
    }

    /// Import every supported file in a directory, skipping files that fail
    pub fn import_directory(&self, dir_path: &Path) -> Result<HealthDataset> {
        let mut dataset = HealthDataset::default();

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.can_import_file(path))
            .collect();
        files.sort();

        for path in files {
            match self.import_file(&path) {
                Ok(imported) => dataset.merge(imported),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping file"),
            }
        }

        Ok(dataset)
    }

    /// Check if this manager can import a given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn has_extension(file_path: &Path, expected: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Serves an imported dataset through the provider interface
#[derive(Debug, Clone)]
pub struct FileDataProvider {
    name: String,
    dataset: HealthDataset,
}

impl FileDataProvider {
    pub fn new(name: impl Into<String>, dataset: HealthDataset) -> Self {
        FileDataProvider {
            name: name.into(),
            dataset,
        }
    }

    /// Import one or more files into a provider
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let dataset = ImportManager::new().import_files(paths)?;
        let name = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Self::new(name, dataset))
    }

    pub fn dataset(&self) -> &HealthDataset {
        &self.dataset
    }
}

fn in_range(at: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    at >= start && at < end
}

#[async_trait]
impl HealthDataProvider for FileDataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_samples(
        &self,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>> {
        Ok(self
            .dataset
            .samples
            .iter()
            .filter(|s| {
                s.kind == kind && in_range(s.timestamp.with_timezone(&Utc), start, end)
            })
            .cloned()
            .collect())
    }

    async fn fetch_workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkoutRecord>> {
        Ok(self
            .dataset
            .workouts
            .iter()
            .filter(|w| in_range(w.start.with_timezone(&Utc), start, end))
            .cloned()
            .collect())
    }

    async fn fetch_sleep_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SleepSession>> {
        Ok(self
            .dataset
            .sleep_sessions
            .iter()
            .filter(|s| in_range(s.wake_time.with_timezone(&Utc), start, end))
            .cloned()
            .collect())
    }

    async fn fetch_physiology(&self) -> Result<UserPhysiology> {
        Ok(self.dataset.physiology.clone())
    }
}
