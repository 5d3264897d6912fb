//! learnflux CLI - Command-line interface for learnflux
//!
//! Commands:
//! - aggregate: Aggregate learner logs into per-year metrics
//! - progression: Emit ordered unit-progression entries
//! - validate: Report rows that would be dropped
//! - doctor: Diagnose configuration and input files

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use learnflux::encoder::ChartEncoder;
use learnflux::schema::{LearnerLog, RawEventAdapter};
use learnflux::types::{ActivityType, OrderedProgressionEntry};
use learnflux::verb::{LiteralVerb, VerbClassifier};
use learnflux::{
    DurationUnit, FluxConfig, FluxError, LearningLogProcessor, ResultTable, SelectionState,
    FLUX_VERSION, PRODUCER_NAME,
};

/// learnflux - Learning-log aggregation for progress dashboards
#[derive(Parser)]
#[command(name = "learnflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Aggregate learner event logs into chart-ready metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate learner logs into per-year metrics
    Aggregate {
        /// Learner log files (<year>/<learner_id>.json or .ndjson)
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Result table (JSON array of {id, test_result, class_id})
        #[arg(long)]
        results: Option<PathBuf>,

        /// Config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Duration unit, overriding the config
        #[arg(long)]
        unit: Option<UnitArg>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        format: MetricsFormat,
    },

    /// Emit ordered unit-progression entries
    Progression {
        /// Learner log files
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Only these learners (repeatable; default all)
        #[arg(long)]
        learner: Vec<String>,

        /// Only this activity (grammar, pronunciation, speaking, listening)
        #[arg(long, value_parser = parse_activity)]
        activity: Option<ActivityType>,

        /// Only this year
        #[arg(long)]
        year: Option<String>,

        /// Config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        format: ProgressionFormat,
    },

    /// Report rows that would be dropped
    Validate {
        /// Learner log files
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input files
    Doctor {
        /// Check config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check result table file
        #[arg(long)]
        results: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Seconds,
    Minutes,
    Hours,
}

impl From<UnitArg> for DurationUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Seconds => DurationUnit::Seconds,
            UnitArg::Minutes => DurationUnit::Minutes,
            UnitArg::Hours => DurationUnit::Hours,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum MetricsFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum ProgressionFormat {
    /// Newline-delimited JSON (one entry per line)
    Ndjson,
    /// JSON array of entries
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn parse_activity(raw: &str) -> Result<ActivityType, String> {
    ActivityType::parse(raw).ok_or_else(|| {
        format!("unknown activity `{raw}` (expected grammar, pronunciation, speaking or listening)")
    })
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("learnflux=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Aggregate {
            input,
            results,
            config,
            unit,
            output,
            format,
        } => cmd_aggregate(&input, results.as_deref(), config.as_deref(), unit, &output, format),

        Commands::Progression {
            input,
            learner,
            activity,
            year,
            config,
            format,
        } => {
            let selection = learner
                .into_iter()
                .fold(SelectionState::new(), |selection, id| selection.select(id))
                .with_activity(activity)
                .with_year(year);
            cmd_progression(&input, &selection, config.as_deref(), format)
        }

        Commands::Validate { input, config, json } => cmd_validate(&input, config.as_deref(), json),

        Commands::Doctor {
            config,
            results,
            json,
        } => cmd_doctor(config.as_deref(), results.as_deref(), json),
    }
}

fn cmd_aggregate(
    inputs: &[PathBuf],
    results: Option<&Path>,
    config: Option<&Path>,
    unit: Option<UnitArg>,
    output: &Path,
    format: MetricsFormat,
) -> Result<(), FluxCliError> {
    let mut config = load_config(config)?;
    if let Some(unit) = unit {
        config.duration_unit = unit.into();
    }

    let results = match results {
        Some(path) => ResultTable::from_json(&fs::read_to_string(path)?)?,
        None => ResultTable::default(),
    };
    info!(learners = results.len(), "loaded result table");

    let logs = load_logs(inputs)?;
    let processor = LearningLogProcessor::new(config.clone()).with_results(results);
    let aggregated = processor.process(&logs);

    let encoder = ChartEncoder::new().with_unit(config.duration_unit);
    let pretty = matches!(format, MetricsFormat::JsonPretty);
    let output_data = encoder.encode_to_json(&aggregated, pretty)?;

    write_output(output, &output_data)
}

fn cmd_progression(
    inputs: &[PathBuf],
    selection: &SelectionState,
    config: Option<&Path>,
    format: ProgressionFormat,
) -> Result<(), FluxCliError> {
    let config = load_config(config)?;
    let logs = load_logs(inputs)?;

    let processor = LearningLogProcessor::new(config);
    let entries = processor.progression_view(&logs, selection);
    debug!(entries = entries.len(), "progression view");

    print!("{}", format_progression(&entries, &format)?);
    Ok(())
}

fn cmd_validate(inputs: &[PathBuf], config: Option<&Path>, json: bool) -> Result<(), FluxCliError> {
    let config = load_config(config)?;
    let naive_offset = config.naive_offset();

    let mut report = ValidationReport::default();
    for path in inputs {
        let loaded = RawEventAdapter::parse_rows(&fs::read_to_string(path)?)?;
        let failures = RawEventAdapter::validate_rows(&loaded.rows, naive_offset);

        let file = path.display().to_string();
        report.total_rows += loaded.rows.len() + loaded.unreadable;
        report.invalid_rows += failures.len() + loaded.unreadable;
        if loaded.unreadable > 0 {
            report.errors.push(ValidationErrorDetail {
                file: file.clone(),
                index: None,
                error: format!("{} unreadable rows", loaded.unreadable),
            });
        }
        report.errors.extend(failures.into_iter().map(|r| ValidationErrorDetail {
            file: file.clone(),
            index: Some(r.index),
            error: r.error.to_string(),
        }));
    }
    report.valid_rows = report.total_rows - report.invalid_rows;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                match err.index {
                    Some(index) => println!("  - {} (row {}): {}", err.file, index, err.error),
                    None => println!("  - {}: {}", err.file, err.error),
                }
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(FluxCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, results: Option<&Path>, json: bool) -> Result<(), FluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("learnflux version {}", FLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "verb_tables".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} lifecycle prefixes, {} literal metric verbs",
            VerbClassifier::new().len(),
            LiteralVerb::ALL.len()
        ),
    });

    if let Some(config_path) = config {
        checks.push(file_check("config", config_path, |content| {
            FluxConfig::from_json(content).map(|c| {
                format!(
                    "Config valid (year starts in month {}, durations in {:?})",
                    c.academic_year_start_month, c.duration_unit
                )
            })
        }));
    }

    if let Some(results_path) = results {
        checks.push(file_check("results", results_path, |content| {
            ResultTable::from_json(content).map(|t| format!("Result table valid ({} learners)", t.len()))
        }));
    }

    let stdout_check = if atty::is(atty::Stream::Stdout) {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a TTY (consider --output or --format json-pretty)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a pipe (machine-readable output ready)".to_string(),
        }
    };
    checks.push(stdout_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("learnflux Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<FluxConfig, FluxCliError> {
    match path {
        Some(path) => Ok(FluxConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(FluxConfig::default()),
    }
}

fn load_logs(inputs: &[PathBuf]) -> Result<Vec<LearnerLog>, FluxCliError> {
    let mut logs = Vec::with_capacity(inputs.len());
    for path in inputs {
        let log = LearnerLog::read(path)?;
        debug!(
            file = %path.display(),
            learner = %log.learner_id,
            rows = log.rows.len(),
            "loaded learner log"
        );
        logs.push(log);
    }
    Ok(logs)
}

fn write_output(output: &Path, data: &str) -> Result<(), FluxCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_progression(
    entries: &[OrderedProgressionEntry],
    format: &ProgressionFormat,
) -> Result<String, FluxCliError> {
    let encoder = ChartEncoder::new();
    match format {
        ProgressionFormat::Ndjson => Ok(encoder.progression_to_ndjson(entries)?),
        ProgressionFormat::Json => Ok(encoder.progression_to_json(entries, false)? + "\n"),
        ProgressionFormat::JsonPretty => Ok(encoder.progression_to_json(entries, true)? + "\n"),
    }
}

fn file_check(
    name: &str,
    path: &Path,
    parse: impl FnOnce(&str) -> Result<String, FluxError>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }
    match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {}: {}", path.display(), e),
        },
    }
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(std::io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<std::io::Error> for FluxCliError {
    fn from(e: std::io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<FluxError> for FluxCliError {
    fn from(e: FluxError) -> Self {
        FluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Flux(FluxError::InvalidLearnerId(id)) => CliError {
                code: "INVALID_LEARNER_ID".to_string(),
                message: format!("Invalid learner id: {}", id),
                hint: Some("Name log files <learner_id>.json inside a <year>/ directory".to_string()),
            },
            FluxCliError::Flux(FluxError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'learnflux doctor --config <file>' for details".to_string()),
            },
            FluxCliError::Flux(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON array or NDJSON of log rows".to_string()),
            },
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed validation", count),
                hint: Some("These rows are dropped during aggregation".to_string()),
            },
            FluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Default, serde::Serialize)]
struct ValidationReport {
    total_rows: usize,
    valid_rows: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    file: String,
    index: Option<usize>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
