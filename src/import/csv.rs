use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::import::{has_extension, ImportFormat};
use crate::models::{MetricKind, MetricSample};
use crate::pipeline::HealthDataset;

/// Header name for the date column after normalization
const DATE_COLUMN: &str = "date";

/// Daily metrics CSV: one row per day, one column per metric
///
/// Timestamps with an offset keep it, so rows date to the wearer's local day.
/// Rows given as a bare date are timestamped at noon UTC so they land on the
/// same calendar day in any provider window. Empty cells are skipped.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(
            &mut column_mapping,
            DATE_COLUMN,
            &["date", "day", "timestamp", "time", "datetime"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "hrv",
            &["hrv", "hrv_ms", "rmssd", "heart_rate_variability"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "resting_hr",
            &["resting_hr", "rhr", "resting_heart_rate", "resting_bpm"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "respiratory_rate",
            &["respiratory_rate", "resp_rate", "breathing_rate", "rr"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_duration",
            &["sleep_duration", "sleep_hours", "sleep", "total_sleep"],
        );
        Self::add_mapping(&mut column_mapping, "sleep_score", &["sleep_score"]);
        Self::add_mapping(&mut column_mapping, "steps", &["steps", "step_count"]);
        Self::add_mapping(
            &mut column_mapping,
            "active_energy",
            &["active_energy", "active_calories", "active_kcal", "calories"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn metric_for_column(column: &str) -> Option<MetricKind> {
        match column {
            "hrv" => Some(MetricKind::Hrv),
            "resting_hr" => Some(MetricKind::RestingHeartRate),
            "respiratory_rate" => Some(MetricKind::RespiratoryRate),
            "sleep_duration" => Some(MetricKind::SleepDuration),
            "sleep_score" => Some(MetricKind::SleepScore),
            "steps" => Some(MetricKind::Steps),
            "active_energy" => Some(MetricKind::ActiveEnergy),
            _ => None,
        }
    }

    fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
        let value = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt);
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        for format in &formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(naive_dt.and_utc().fixed_offset());
            }
        }

        for format in ["%Y-%m-%d", "%d/%m/%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return NaiveTime::from_hms_opt(12, 0, 0)
                    .map(|noon| date.and_time(noon).and_utc().fixed_offset());
            }
        }

        None
    }

    /// Parse CSV content into samples
    pub fn parse_str(&self, content: &str) -> Result<HealthDataset> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?
            .clone();

        let columns: Vec<String> = headers
            .iter()
            .map(|header| self.normalize_column_name(header))
            .collect();

        let date_index = columns
            .iter()
            .position(|c| c == DATE_COLUMN)
            .ok_or_else(|| ImportError::MissingData {
                field: DATE_COLUMN.to_string(),
            })?;

        let metric_columns: Vec<(usize, &str, MetricKind)> = columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| Self::metric_for_column(c).map(|kind| (i, c.as_str(), kind)))
            .collect();

        if metric_columns.is_empty() {
            return Err(ImportError::MissingData {
                field: "metric columns".to_string(),
            }
            .into());
        }

        let mut samples = Vec::new();

        for (row, result) in reader.records().enumerate() {
            // Header is line 1
            let line = row + 2;
            let record = result.map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?;

            let date_value = record.get(date_index).unwrap_or_default();
            let timestamp =
                Self::parse_timestamp(date_value).ok_or_else(|| ImportError::InvalidValue {
                    field: DATE_COLUMN.to_string(),
                    line,
                    value: date_value.to_string(),
                })?;

            for (index, column, kind) in &metric_columns {
                let value = match record.get(*index) {
                    Some(value) if !value.is_empty() => value,
                    _ => continue,
                };

                let parsed = value
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ImportError::InvalidValue {
                        field: column.to_string(),
                        line,
                        value: value.to_string(),
                    })?;

                samples.push(MetricSample::new(*kind, parsed, timestamp).with_source("csv"));
            }
        }

        if samples.is_empty() {
            return Err(ImportError::MissingData {
                field: "rows".to_string(),
            }
            .into());
        }

        debug!(samples = samples.len(), "Parsed daily metrics CSV");

        Ok(HealthDataset {
            samples,
            ..Default::default()
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<HealthDataset> {
        let content = std::fs::read_to_string(file_path)?;
        self.parse_str(&content)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VitalRsError;

    #[test]
    fn test_column_aliases() {
        let csv = "Day,RMSSD,Resting Heart Rate,Sleep Hours,Step Count\n\
                   2024-09-01,58.5,51,7.5,8200\n\
                   2024-09-02,61.0,50,,10400\n";
        let dataset = CsvImporter::new().parse_str(csv).unwrap();

        assert_eq!(dataset.samples.len(), 7);
        let hrv: Vec<f64> = dataset
            .samples
            .iter()
            .filter(|s| s.kind == MetricKind::Hrv)
            .map(|s| s.value)
            .collect();
        assert_eq!(hrv, vec![58.5, 61.0]);
        assert_eq!(
            dataset.samples[0].date(),
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
        );
    }

    #[test]
    fn test_bare_dates_land_at_noon() {
        let ts = CsvImporter::parse_timestamp("2024-09-01").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-09-01T12:00:00+00:00");

        let ts = CsvImporter::parse_timestamp("2024-09-01T06:30:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-09-01T06:30:00+00:00");
    }

    #[test]
    fn test_offset_timestamps_keep_local_day() {
        let csv = "timestamp,hrv\n2024-09-02T06:30:00+10:00,61\n";
        let dataset = CsvImporter::new().parse_str(csv).unwrap();

        assert_eq!(
            dataset.samples[0].date(),
            NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
        );
    }

    #[test]
    fn test_invalid_value_reports_line() {
        let csv = "date,hrv\n2024-09-01,55\n2024-09-02,abc\n";
        let err = CsvImporter::new().parse_str(csv).unwrap_err();

        match err {
            VitalRsError::Import(ImportError::InvalidValue { field, line, value }) => {
                assert_eq!(field, "hrv");
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_date_column() {
        let err = CsvImporter::new().parse_str("hrv\n55\n").unwrap_err();
        assert!(matches!(
            err,
            VitalRsError::Import(ImportError::MissingData { .. })
        ));
    }
}
