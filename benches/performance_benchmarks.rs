use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vitalrs::baseline::BaselineEstimator;
use vitalrs::illness::{IllnessDetectionEngine, IllnessInputs, SignalSeries};
use vitalrs::models::{
    ActivityType, MetricKind, MetricSample, SleepSession, UserPhysiology, WorkoutRecord,
};
use vitalrs::{
    HealthDataset, LoadEstimator, Pipeline, PmcCalculator, SleepScoreEngine, TrainingLoadState,
};

/// Performance benchmarks for the scoring engines
///
/// Dataset sizes are in days of history so throughput reads as days per second.

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn create_benchmark_dataset(days: u32) -> HealthDataset {
    let utc = FixedOffset::east_opt(0).unwrap();
    let mut data = HealthDataset {
        physiology: UserPhysiology {
            ftp: Some(250),
            max_hr: Some(190),
            resting_hr: Some(50),
            body_mass_kg: None,
        },
        ..Default::default()
    };

    for offset in 0..days {
        let date = as_of() - Duration::days(offset as i64);
        let at = |hour: u32| date.and_hms_opt(hour, 0, 0).unwrap().and_utc();
        let wobble = (offset % 5) as f64;

        data.samples.extend([
            MetricSample::new(MetricKind::Hrv, 58.0 + wobble, at(4)),
            MetricSample::new(MetricKind::RestingHeartRate, 51.0 + wobble * 0.4, at(6)),
            MetricSample::new(MetricKind::RespiratoryRate, 14.0, at(6)),
            MetricSample::new(MetricKind::Steps, 7000.0 + wobble * 500.0, at(21)),
        ]);

        let wake = utc.from_utc_datetime(&at(7).naive_utc());
        data.sleep_sessions.push(SleepSession {
            bedtime: wake - Duration::minutes(480 + (offset % 4) as i64 * 10),
            wake_time: wake,
            deep_minutes: 85,
            light_minutes: 250,
            rem_minutes: 100,
            awake_minutes: 35,
            interruptions: Some((offset % 4) as u8),
            source: None,
        });

        if offset % 2 == 0 {
            data.workouts.push(WorkoutRecord {
                id: format!("ride-{}", offset),
                start: utc.from_utc_datetime(&at(17).naive_utc()),
                duration_seconds: 3600 + (offset % 3) * 900,
                activity_type: ActivityType::Cycling,
                average_power: Some(190),
                normalized_power: Some(210),
                average_heart_rate: Some(142),
                training_stress: None,
                rpe: None,
                muscle_groups: vec![],
                source: None,
            });
        }
    }

    data
}

fn bench_baseline_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Baseline Estimation");
    let estimator = BaselineEstimator::new();

    for &days in &[30, 90, 365] {
        let data = create_benchmark_dataset(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("estimate_all", days),
            &data.samples,
            |b, samples| {
                b.iter(|| estimator.estimate_all(black_box(samples), as_of()));
            },
        );
    }

    group.finish();
}

fn bench_training_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training Load");
    let estimator = LoadEstimator::new();
    let calculator = PmcCalculator::new();

    for &days in &[30, 90, 365] {
        let data = create_benchmark_dataset(days);
        let daily_loads = estimator.daily_loads(&data.workouts, &data.physiology);
        let start = as_of() - Duration::days(days as i64 - 1);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("daily_loads", days),
            &data,
            |b, data| {
                b.iter(|| estimator.daily_loads(black_box(&data.workouts), &data.physiology));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("pmc_series", days),
            &daily_loads,
            |b, loads| {
                b.iter(|| {
                    calculator.series(black_box(loads), start, as_of(), TrainingLoadState::zero())
                });
            },
        );
    }

    group.finish();
}

fn bench_sleep_scoring(c: &mut Criterion) {
    let data = create_benchmark_dataset(30);
    let engine = SleepScoreEngine::new();

    c.bench_function("sleep_score_month", |b| {
        b.iter(|| {
            for session in &data.sleep_sessions {
                black_box(engine.score(session, None));
            }
        });
    });
}

fn bench_illness_detection(c: &mut Criterion) {
    let engine = IllnessDetectionEngine::new();
    let mut inputs = IllnessInputs::new(as_of());
    inputs.hrv = SignalSeries::new(
        (0..7).map(|i| Some(60.0 - 3.0 * i as f64)).collect(),
        Some(62.0),
    );
    inputs.resting_hr = SignalSeries::new(
        (0..7).map(|i| Some(50.0 + i as f64)).collect(),
        Some(50.0),
    );

    c.bench_function("illness_detect", |b| {
        b.iter(|| engine.detect(black_box(&inputs)));
    });
}

fn bench_pipeline_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    group.sample_size(20);
    let pipeline = Pipeline::new();

    for &days in &[30, 60, 180] {
        let data = create_benchmark_dataset(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("compute", days), &data, |b, data| {
            b.iter(|| pipeline.compute(black_box(data), as_of()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_baseline_estimation,
    bench_training_load,
    bench_sleep_scoring,
    bench_illness_detection,
    bench_pipeline_compute
);
criterion_main!(benches);
