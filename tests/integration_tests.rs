use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use vitalrs::models::{
    ActivityType, MetricKind, MetricSample, MuscleGroup, SleepSession, UserPhysiology,
    WorkoutRecord,
};
use vitalrs::{
    AppConfig, FileDataProvider, HealthDataset, IllnessSeverity, ImportManager, Pipeline,
};

/// Integration tests that exercise the complete scoring workflows

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn day(offset: u64) -> NaiveDate {
        as_of() - Duration::days(offset as i64)
    }

    fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
        date.and_hms_opt(hour, 0, 0).unwrap().and_utc()
    }

    fn local(date: NaiveDate, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .from_utc_datetime(&at(date, hour).naive_utc())
    }

    fn create_test_physiology() -> UserPhysiology {
        UserPhysiology {
            ftp: Some(250),
            max_hr: Some(190),
            resting_hr: Some(50),
            body_mass_kg: Some(70.0),
        }
    }

    fn create_test_session(date: NaiveDate, deep: u16, light: u16, rem: u16) -> SleepSession {
        let wake = local(date, 7);
        SleepSession {
            bedtime: wake - Duration::hours(8),
            wake_time: wake,
            deep_minutes: deep,
            light_minutes: light,
            rem_minutes: rem,
            awake_minutes: 30,
            interruptions: Some(1),
            source: Some("ring".to_string()),
        }
    }

    fn create_test_workout(date: NaiveDate, activity_type: ActivityType) -> WorkoutRecord {
        WorkoutRecord {
            id: format!("{}-{}", activity_type, date),
            start: local(date, 17),
            duration_seconds: 3600,
            activity_type,
            average_power: None,
            normalized_power: match activity_type {
                ActivityType::Cycling => Some(200),
                _ => None,
            },
            average_heart_rate: Some(145),
            training_stress: None,
            rpe: match activity_type {
                ActivityType::StrengthTraining => Some(7.0),
                _ => None,
            },
            muscle_groups: match activity_type {
                ActivityType::StrengthTraining => vec![MuscleGroup::Legs, MuscleGroup::Back],
                _ => vec![],
            },
            source: None,
        }
    }

    /// Six weeks of stable data with a mixed training week
    fn create_test_dataset() -> HealthDataset {
        let mut data = HealthDataset {
            physiology: create_test_physiology(),
            ..Default::default()
        };

        for offset in 0..42 {
            let date = day(offset);
            let wobble = (offset % 3) as f64;
            data.samples.extend([
                MetricSample::new(MetricKind::Hrv, 62.0 + wobble, at(date, 4)),
                MetricSample::new(MetricKind::RestingHeartRate, 50.0 + wobble * 0.5, at(date, 6)),
                MetricSample::new(MetricKind::RespiratoryRate, 14.5, at(date, 6)),
                MetricSample::new(MetricKind::Steps, 9000.0, at(date, 21)),
                MetricSample::new(MetricKind::ActiveEnergy, 450.0, at(date, 21)),
            ]);
            data.sleep_sessions
                .push(create_test_session(date, 95, 260, 105));

            match offset % 7 {
                1 | 4 => data
                    .workouts
                    .push(create_test_workout(date, ActivityType::Cycling)),
                2 => data
                    .workouts
                    .push(create_test_workout(date, ActivityType::Running)),
                5 => data
                    .workouts
                    .push(create_test_workout(date, ActivityType::StrengthTraining)),
                _ => {}
            }
        }

        data
    }

    /// Test the complete daily report on a stable dataset
    #[tokio::test]
    async fn test_full_report_workflow() {
        let provider = FileDataProvider::new("fixture", create_test_dataset());
        let report = Pipeline::new().run(&provider, as_of()).await.unwrap();

        let recovery = report.recovery.as_ref().expect("recovery");
        let sleep = report.sleep.as_ref().expect("sleep");
        let strain = report.strain.as_ref().expect("strain");

        assert!(recovery.score <= 100);
        assert!(sleep.score >= 70, "sleep score {}", sleep.score);
        assert!(strain.sub_score("activity").is_some());
        assert!(report.illness.is_none());

        let training = report.training_load.expect("training load");
        assert_eq!(training.tsb, training.ctl - training.atl);
        assert!(training.ctl > rust_decimal::Decimal::ZERO);

        let circadian = report.circadian.expect("circadian");
        assert!(circadian.bedtime_variance_minutes < 1.0);
        assert_eq!(circadian.average_bedtime.floor() as u32, 23);

        assert!(report.baselines.contains_key(&MetricKind::Hrv));
        assert!(!report.stress.is_empty());
    }

    /// HRV falling for a week with a rising resting HR should raise an indicator
    #[tokio::test]
    async fn test_illness_detected_end_to_end() {
        let mut data = create_test_dataset();
        for sample in data.samples.iter_mut() {
            let days_ago = (as_of() - sample.date()).num_days();
            if days_ago >= 7 {
                continue;
            }
            let progress = (7 - days_ago) as f64;
            match sample.kind {
                MetricKind::Hrv => sample.value = 62.0 - 3.5 * progress,
                MetricKind::RestingHeartRate => sample.value = 50.0 + 1.2 * progress,
                _ => {}
            }
        }

        let provider = FileDataProvider::new("fixture", data);
        let report = Pipeline::new().run(&provider, as_of()).await.unwrap();

        let illness = report.illness.expect("illness indicator");
        assert!(illness.severity >= IllnessSeverity::Moderate);
        assert!(illness.confidence >= 0.5 && illness.confidence <= 1.0);
        assert!(illness.signals.len() >= 2);

        let recovery = report.recovery.expect("recovery");
        assert!(recovery
            .explanation
            .unwrap_or_default()
            .to_lowercase()
            .contains("illness"));
    }

    /// A provider with nothing in it gives a report with every part absent
    #[tokio::test]
    async fn test_empty_provider_gives_empty_report() {
        let provider = FileDataProvider::new("empty", HealthDataset::default());
        let report = Pipeline::new().run(&provider, as_of()).await.unwrap();
        assert!(report.is_empty());
    }

    /// Sleep score finishes before recovery reads it
    #[test]
    fn test_recovery_uses_same_day_sleep_score() {
        let mut data = create_test_dataset();
        // A short, broken night on the report date
        data.sleep_sessions.retain(|s| s.night_of() != as_of());
        data.sleep_sessions
            .push(create_test_session(as_of(), 20, 140, 30));

        let report = Pipeline::new().compute(&data, as_of());
        let sleep = report.sleep.expect("sleep");
        let recovery = report.recovery.expect("recovery");

        assert_eq!(recovery.sub_score("sleep"), Some(sleep.score as f64));
        assert!(sleep.score < 70);
    }

    /// Missing sources only remove the scores that depend on them
    #[test]
    fn test_partial_data_degrades_gracefully() {
        let mut data = create_test_dataset();
        data.sleep_sessions.clear();
        data.workouts.clear();

        let report = Pipeline::new().compute(&data, as_of());
        assert!(report.sleep.is_none());
        assert!(report.training_load.is_none());
        assert!(report.circadian.is_none());

        let recovery = report.recovery.expect("recovery from HRV and RHR");
        assert!(recovery.sub_score("hrv").is_some());
        assert!(recovery.sub_score("form").is_some());
        assert!(recovery
            .explanation
            .unwrap_or_default()
            .contains("No sleep recorded"));
    }

    /// Configuration changes flow through to the engines
    #[test]
    fn test_config_drives_pipeline() {
        let data = create_test_dataset();

        let default_report = Pipeline::new().compute(&data, as_of());

        let mut config = AppConfig::default();
        config.sleep.sleep_need_hours = 10.0;
        let strict_report = Pipeline::from_config(&config).compute(&data, as_of());

        let default_sleep = default_report.sleep.unwrap().score;
        let strict_sleep = strict_report.sleep.unwrap().score;
        assert!(strict_sleep < default_sleep);
    }

    /// Import a JSON export and a CSV of daily metrics, then score them together
    #[tokio::test]
    async fn test_import_and_score_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let mut export = create_test_dataset();
        export.samples.retain(|s| s.kind != MetricKind::Steps);
        let json_path = dir.path().join("export.json");
        std::fs::write(&json_path, serde_json::to_string(&export).unwrap()).unwrap();

        let mut csv = String::from("date,steps\n");
        for offset in 0..42 {
            csv.push_str(&format!("{},{}\n", day(offset), 8500));
        }
        let csv_path = dir.path().join("steps.csv");
        std::fs::write(&csv_path, csv).unwrap();

        let provider = FileDataProvider::from_paths(&[json_path.clone(), csv_path]).unwrap();
        assert_eq!(provider.dataset().physiology.max_hr, Some(190));
        assert!(provider
            .dataset()
            .samples
            .iter()
            .any(|s| s.kind == MetricKind::Steps && s.value == 8500.0));

        let report = Pipeline::new().run(&provider, as_of()).await.unwrap();
        assert!(report.recovery.is_some());
        assert!(report.strain.is_some());

        let direct = ImportManager::new().import_file(&json_path).unwrap();
        assert_eq!(direct.workouts.len(), export.workouts.len());
    }

    /// Reports serialize to JSON for machine consumers
    #[test]
    fn test_report_serializes() {
        let report = Pipeline::new().compute(&create_test_dataset(), as_of());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["as_of"], "2024-10-01");
        assert!(json["recovery"]["score"].is_number());
        assert_eq!(json["recovery"]["band"]["scale"], "Recovery");
    }
}
