use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use vitalrs::circadian::CircadianRhythmData;
use vitalrs::illness::IllnessIndicator;
use vitalrs::logging::init_logging;
use vitalrs::pmc::PmcPoint;
use vitalrs::{
    AppConfig, Band, FileDataProvider, HealthDataset, HealthReport, LoadEstimator,
    PmcCalculator, Pipeline, RecoveryBand, ScoreResult, StrainBand, TrainingLoadState,
    WellnessBand,
};

/// VitalRS - Physiological Scoring CLI
///
/// Scores recovery, sleep and strain from exported health data, and watches
/// for illness and schedule drift against your own baselines.
#[derive(Parser)]
#[command(name = "vitalrs")]
#[command(version)]
#[command(about = "Physiological scoring from exported health data", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// Dataset files or directories (JSON export or daily metrics CSV)
    #[arg(short, long = "data", value_name = "PATH", required = true, num_args = 1..)]
    data: Vec<PathBuf>,

    /// Report date (YYYY-MM-DD); defaults to the latest day in the data
    #[arg(short = 'D', long)]
    date: Option<NaiveDate>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full daily report
    Report(DataArgs),

    /// Recovery score with its components
    Recovery(DataArgs),

    /// Sleep score for the night ending on the report date
    Sleep(DataArgs),

    /// Strain score for the report date
    Strain(DataArgs),

    /// Illness indicator and contributing signals
    Illness(DataArgs),

    /// Daily stress over the analysis window
    Stress(DataArgs),

    /// Sleep and training schedule consistency
    Circadian(DataArgs),

    /// Training load chart (CTL, ATL, TSB)
    Load {
        #[command(flatten)]
        data: DataArgs,

        /// Number of days to show
        #[arg(short = 'n', long, default_value = "14")]
        days: u32,
    },

    /// Manage the configuration file
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "Score")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Notes")]
    explanation: String,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Days")]
    days: u32,
}

#[derive(Tabled)]
struct StressRow {
    #[tabled(rename = "Date")]
    date: NaiveDate,
    #[tabled(rename = "Stress")]
    stress: String,
    #[tabled(rename = "Factors")]
    factors: usize,
}

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Date")]
    date: NaiveDate,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "CTL")]
    ctl: String,
    #[tabled(rename = "ATL")]
    atl: String,
    #[tabled(rename = "TSB")]
    tsb: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config --init` may point at a file that does not exist yet
    let initializing = matches!(cli.command, Commands::Config { init: true, .. });
    let config = match &cli.config {
        Some(path) if !(initializing && !path.exists()) => AppConfig::load_from_file(path)?,
        _ => AppConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    init_logging(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Report(args) => {
            let report = run_report(&config, &args).await?;
            if args.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }

        Commands::Recovery(args) => {
            let report = run_report(&config, &args).await?;
            print_score(args.json, "Recovery", report.recovery.as_ref())?;
        }

        Commands::Sleep(args) => {
            let report = run_report(&config, &args).await?;
            print_score(args.json, "Sleep", report.sleep.as_ref())?;
        }

        Commands::Strain(args) => {
            let report = run_report(&config, &args).await?;
            print_score(args.json, "Strain", report.strain.as_ref())?;
        }

        Commands::Illness(args) => {
            let report = run_report(&config, &args).await?;
            if args.json {
                print_json(&report.illness)?;
            } else {
                print_illness(report.illness.as_ref());
            }
        }

        Commands::Stress(args) => {
            let report = run_report(&config, &args).await?;
            if args.json {
                print_json(&report.stress)?;
            } else if report.stress.is_empty() {
                println!("{}", "Not enough data to estimate stress".yellow());
            } else {
                let rows: Vec<StressRow> = report
                    .stress
                    .iter()
                    .map(|p| StressRow {
                        date: p.date,
                        stress: format!("{:.0}", p.stress),
                        factors: p.factor_count,
                    })
                    .collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }

        Commands::Circadian(args) => {
            let report = run_report(&config, &args).await?;
            if args.json {
                print_json(&report.circadian)?;
            } else {
                print_circadian(report.circadian.as_ref());
            }
        }

        Commands::Load { data, days } => {
            let (provider, as_of) = load_dataset(&data)?;
            let points = training_load_series(&config, provider.dataset(), as_of, days)?;
            if data.json {
                print_json(&points)?;
            } else {
                print_load(&config, &points);
            }
        }

        Commands::Config { init, show } => {
            let path = cli.config.unwrap_or_else(AppConfig::default_config_path);
            if init {
                let mut fresh = AppConfig::default();
                fresh.save_to_file(&path)?;
                println!(
                    "{} {}",
                    "✓ Wrote default configuration to".green(),
                    path.display()
                );
            }
            if show || !init {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn load_dataset(args: &DataArgs) -> Result<(FileDataProvider, NaiveDate)> {
    let provider = FileDataProvider::from_paths(&args.data)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let as_of = args
        .date
        .or_else(|| latest_date(provider.dataset()))
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok((provider, as_of))
}

async fn run_report(config: &AppConfig, args: &DataArgs) -> Result<HealthReport> {
    let (provider, as_of) = load_dataset(args)?;

    Pipeline::from_config(config)
        .run(&provider, as_of)
        .await
        .context("Failed to compute report")
}

/// Most recent calendar day with any data
fn latest_date(dataset: &HealthDataset) -> Option<NaiveDate> {
    let samples = dataset.samples.iter().map(|s| s.date());
    let workouts = dataset.workouts.iter().map(|w| w.date());
    let nights = dataset.sleep_sessions.iter().map(|s| s.night_of());
    samples.chain(workouts).chain(nights).max()
}

fn training_load_series(
    config: &AppConfig,
    dataset: &HealthDataset,
    as_of: NaiveDate,
    days: u32,
) -> Result<Vec<PmcPoint>> {
    let physiology = dataset.physiology.clone().or(config.physiology.clone());
    let daily_loads =
        LoadEstimator::with_config(config.load.clone()).daily_loads(&dataset.workouts, &physiology);

    let first = match daily_loads.keys().next() {
        Some(first) if *first <= as_of => *first,
        _ => return Ok(Vec::new()),
    };

    let points = PmcCalculator::with_config(config.pmc.clone()).series(
        &daily_loads,
        first,
        as_of,
        TrainingLoadState::zero(),
    )?;

    let skip = points.len().saturating_sub(days.max(1) as usize);
    Ok(points.into_iter().skip(skip).collect())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn colored_band(band: &Band) -> ColoredString {
    let text = band.to_string();
    match band {
        Band::Recovery(RecoveryBand::Optimal) | Band::Wellness(WellnessBand::Optimal) => {
            text.green()
        }
        Band::Recovery(RecoveryBand::Good) | Band::Wellness(WellnessBand::Good) => text.cyan(),
        Band::Recovery(RecoveryBand::Fair) | Band::Wellness(WellnessBand::Fair) => text.yellow(),
        Band::Wellness(WellnessBand::PayAttention) => text.red(),
        Band::Strain(StrainBand::High) => text.magenta(),
        Band::Strain(StrainBand::Moderate) => text.blue(),
        Band::Strain(StrainBand::Light) => text.normal(),
    }
}

fn score_row(name: &str, result: Option<&ScoreResult>) -> ScoreRow {
    match result {
        Some(r) => ScoreRow {
            name: name.to_string(),
            value: r.score.to_string(),
            band: colored_band(&r.band).to_string(),
            explanation: r.explanation.clone().unwrap_or_default(),
        },
        None => ScoreRow {
            name: name.to_string(),
            value: "-".to_string(),
            band: "-".dimmed().to_string(),
            explanation: "Not enough data".to_string(),
        },
    }
}

fn print_score(json: bool, name: &str, result: Option<&ScoreResult>) -> Result<()> {
    if json {
        return print_json(&result);
    }

    let result = match result {
        Some(result) => result,
        None => {
            println!("{}", format!("{} unavailable: not enough data", name).yellow());
            return Ok(());
        }
    };

    println!("{}", Table::new([score_row(name, Some(result))]).with(Style::rounded()));

    let components: Vec<ComponentRow> = result
        .sub_scores
        .iter()
        .map(|(component, value)| ComponentRow {
            name: component.replace('_', " "),
            value: format!("{:.1}", value),
        })
        .collect();
    if !components.is_empty() {
        println!("{}", Table::new(components).with(Style::rounded()));
    }
    Ok(())
}

fn print_report(report: &HealthReport) {
    println!("{}", format!("Health report for {}", report.as_of).bold());

    let rows = vec![
        score_row("Recovery", report.recovery.as_ref()),
        score_row("Sleep", report.sleep.as_ref()),
        score_row("Strain", report.strain.as_ref()),
    ];
    println!("{}", Table::new(rows).with(Style::rounded()));

    match &report.training_load {
        Some(state) => {
            let interpretation = state.interpretation();
            println!(
                "Training load: CTL {} | ATL {} | TSB {} ({})",
                state.ctl.round_dp(1),
                state.atl.round_dp(1),
                state.tsb.round_dp(1),
                interpretation.description()
            );
        }
        None => println!("{}", "Training load: no workouts recorded".dimmed()),
    }

    if let Some(latest) = report.stress.last() {
        println!("Stress: {:.0} ({} factors)", latest.stress, latest.factor_count);
    }

    print_illness(report.illness.as_ref());
    print_circadian(report.circadian.as_ref());
}

fn print_illness(indicator: Option<&IllnessIndicator>) {
    let indicator = match indicator {
        Some(indicator) => indicator,
        None => {
            println!("{}", "✓ No signs of illness".green());
            return;
        }
    };

    println!(
        "{}",
        format!(
            "⚠ Possible illness: {} severity, {:.0}% confidence",
            indicator.severity,
            indicator.confidence * 100.0
        )
        .red()
        .bold()
    );

    let rows: Vec<SignalRow> = indicator
        .signals
        .iter()
        .map(|s| SignalRow {
            signal: s.signal_type.to_string(),
            value: format!("{:.1}", s.detected_value),
            baseline: format!("{:.1}", s.baseline),
            deviation: format!("{:+.1}%", s.deviation_percent),
            days: s.consecutive_days,
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{}", indicator.recommendation);
}

fn print_circadian(data: Option<&CircadianRhythmData>) {
    let data = match data {
        Some(data) => data,
        None => {
            println!("{}", "Schedule: no sleep sessions recorded".dimmed());
            return;
        }
    };

    let mut rows = vec![
        ComponentRow {
            name: "Average bedtime".to_string(),
            value: CircadianRhythmData::format_hour(data.average_bedtime),
        },
        ComponentRow {
            name: "Average wake time".to_string(),
            value: CircadianRhythmData::format_hour(data.average_wake_time),
        },
        ComponentRow {
            name: "Bedtime variation".to_string(),
            value: format!("{:.0} min", data.bedtime_variance_minutes),
        },
        ComponentRow {
            name: "Consistency".to_string(),
            value: format!("{:.0}", data.consistency_score),
        },
    ];
    if let Some(training) = data.average_training_time {
        rows.push(ComponentRow {
            name: "Average training time".to_string(),
            value: CircadianRhythmData::format_hour(training),
        });
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_load(config: &AppConfig, points: &[PmcPoint]) {
    if points.is_empty() {
        println!("{}", "No workouts recorded".yellow());
        return;
    }

    let rows: Vec<LoadRow> = points
        .iter()
        .map(|p| LoadRow {
            date: p.date,
            load: p.daily_load.round_dp(0).to_string(),
            ctl: p.state.ctl.round_dp(1).to_string(),
            atl: p.state.atl.round_dp(1).to_string(),
            tsb: p.state.tsb.round_dp(1).to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if let Some(latest) = points.last() {
        let calculator = PmcCalculator::with_config(config.pmc.clone());
        for recommendation in calculator.generate_recommendations(latest) {
            println!("• {}", recommendation);
        }
    }
}
