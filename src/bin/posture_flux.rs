//! Posture Flux CLI
//!
//! Commands:
//! - analyze: Produce the day report for one calendar day
//! - dates: List the calendar days present in a table
//! - validate: Check raw rows against the column contract
//! - schema: Print the raw table column contract

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use posture_flux::adapter::{RawTable, RawTableAdapter, RowIssue};
use posture_flux::classifier::load_classifier;
use posture_flux::config::{self, Config, ConfigError, DEFAULT_CONFIG_PATH};
use posture_flux::encoder::ReportEncoder;
use posture_flux::normalizer::Normalizer;
use posture_flux::pipeline::{available_dates, PostureProcessor};
use posture_flux::posture::Posture;
use posture_flux::source::TableFormat;
use posture_flux::types::{
    DHT_TEMP_COLUMN, FEATURE_COLUMNS, HUMIDITY_COLUMN, HUMIDITY_SENTINEL, MPU_TEMP_COLUMN,
    TIMESTAMP_COLUMN,
};
use posture_flux::{PostureError, VERSION};

/// Posture Flux - posture-session analytics for smart-chair sensor logs
#[derive(Parser)]
#[command(name = "posture-flux")]
#[command(version = VERSION)]
#[command(about = "Turn smart-chair sensor logs into daily posture reports", long_about = None)]
struct Cli {
    /// Config file (default: config/posture-flux.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce the day report for one calendar day
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        format: InputFormat,

        /// Classifier model file (overrides [model] path)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Day to analyze (YYYY-MM-DD); defaults to the latest day in the table
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// List the calendar days present in a table
    Dates {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        format: InputFormat,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check raw rows against the column contract
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the raw table column contract
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// JSON array of rows
    Json,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
}

impl From<InputFormat> for TableFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Json => TableFormat::Json,
            InputFormat::Ndjson => TableFormat::Ndjson,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn init_tracing(level: &str) {
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    let config = load_config(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_deref().unwrap_or(config.log_level()));

    match cli.command {
        Commands::Analyze {
            input,
            format,
            model,
            date,
            output_format,
        } => cmd_analyze(&config, &input, format, model.as_deref(), date, output_format),

        Commands::Dates {
            input,
            format,
            json,
        } => cmd_dates(&config, &input, format, json),

        Commands::Validate {
            input,
            format,
            json,
        } => cmd_validate(&config, &input, format, json),

        Commands::Schema { json } => cmd_schema(json),
    }
}

/// Explicit `--config` must exist; the default path is optional
fn load_config(path: Option<&Path>) -> Result<Config, FluxCliError> {
    match path {
        Some(path) => Ok(config::load_from_path(path)?),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok(config::load_default()?),
        None => Ok(Config::default()),
    }
}

fn read_table(input: &Path, format: InputFormat) -> Result<RawTable, FluxCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let table = TableFormat::from(format).parse(&input_data)?;
    tracing::info!(rows = table.len(), "Raw table loaded");
    Ok(table)
}

fn cmd_analyze(
    config: &Config,
    input: &Path,
    format: InputFormat,
    model: Option<&Path>,
    date: Option<NaiveDate>,
    output_format: OutputFormat,
) -> Result<(), FluxCliError> {
    let model_path = model
        .or_else(|| config.model_path())
        .ok_or(FluxCliError::NoModel)?;
    let classifier = load_classifier(model_path)?;
    let processor = PostureProcessor::from_config(classifier, config)?;

    let table = read_table(input, format)?;
    let normalized = processor.normalize(&table);
    let date = match date {
        Some(date) => date,
        None => processor
            .latest_date(&normalized)
            .ok_or(FluxCliError::NoRows)?,
    };

    let analysis = processor.analyze_normalized(&normalized, date)?;
    let encoder = ReportEncoder::new();
    let output = match output_format {
        OutputFormat::Json => encoder.encode_to_json(&analysis)?,
        OutputFormat::JsonPretty => encoder.encode_to_json_pretty(&analysis)?,
    };
    println!("{}", output);

    Ok(())
}

fn cmd_dates(
    config: &Config,
    input: &Path,
    format: InputFormat,
    json: bool,
) -> Result<(), FluxCliError> {
    let offset = config.utc_offset()?;
    let table = read_table(input, format)?;
    let dates = available_dates(&Normalizer::new(offset).normalize(&table), offset);

    if json {
        println!("{}", serde_json::to_string_pretty(&dates)?);
    } else {
        for day in &dates {
            println!("{}  {} rows", day.date, day.rows);
        }
    }

    Ok(())
}

fn cmd_validate(
    config: &Config,
    input: &Path,
    format: InputFormat,
    json: bool,
) -> Result<(), FluxCliError> {
    let offset = config.utc_offset()?;
    let table = read_table(input, format)?;
    let results = RawTableAdapter::validate_rows(&table, offset);

    let dropped_rows = results
        .iter()
        .filter(|r| r.issues.iter().any(RowIssue::drops_row))
        .count();

    let report = ValidationReport {
        total_rows: table.len(),
        clean_rows: table.len() - results.len(),
        dropped_rows,
        rows: results
            .iter()
            .map(|r| ValidationRowDetail {
                index: r.index,
                issues: r.issues.iter().map(describe_issue).collect(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Clean rows:   {}", report.clean_rows);
        println!("Dropped rows: {}", report.dropped_rows);

        if !report.rows.is_empty() {
            println!("\nIssues:");
            for row in &report.rows {
                println!("  - Row {}: {}", row.index, row.issues.join("; "));
            }
        }
    }

    if report.dropped_rows > 0 {
        Err(FluxCliError::ValidationFailed(report.dropped_rows))
    } else {
        Ok(())
    }
}

fn cmd_schema(json: bool) -> Result<(), FluxCliError> {
    if json {
        println!("{}", get_input_json_schema());
        return Ok(());
    }

    println!("Raw table columns");
    println!();
    println!("- {}: sample time (RFC 3339, YYYY-MM-DD HH:MM:SS, M/D/YYYY H:MM:SS or epoch seconds)", TIMESTAMP_COLUMN);
    println!("- {}: classifier features, in model order", FEATURE_COLUMNS.join(", "));
    println!("- {}: MPU-6050 temperature (celsius)", MPU_TEMP_COLUMN);
    println!("- {}: relative humidity (%), {} on sensor fault", HUMIDITY_COLUMN, HUMIDITY_SENTINEL);
    println!("- {}: DHT22 temperature (celsius)", DHT_TEMP_COLUMN);
    println!();
    println!("Posture codes and quality:");
    for posture in Posture::ALL {
        println!("  {}  {}", posture.code(), posture.quality().as_str());
    }

    Ok(())
}

fn get_input_json_schema() -> String {
    let mut properties = serde_json::Map::new();
    properties.insert(
        TIMESTAMP_COLUMN.to_string(),
        serde_json::json!({ "type": ["string", "number"] }),
    );
    for column in FEATURE_COLUMNS {
        properties.insert(column.to_string(), serde_json::json!({ "type": "number" }));
    }
    for column in [MPU_TEMP_COLUMN, HUMIDITY_COLUMN, DHT_TEMP_COLUMN] {
        properties.insert(column.to_string(), serde_json::json!({ "type": "number" }));
    }

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "posture_flux.raw_row",
        "description": "One smart-chair sensor sample",
        "type": "object",
        "required": [TIMESTAMP_COLUMN],
        "properties": properties,
    })
    .to_string()
}

fn describe_issue(issue: &RowIssue) -> String {
    match issue {
        RowIssue::TimestampUnparseable { value } => {
            format!("unparseable timestamp {:?} (row dropped)", value)
        }
        RowIssue::FeatureMissing { column } => format!("missing feature {}", column),
        RowIssue::HumiditySentinel => "humidity fault".to_string(),
    }
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Pipeline(PostureError),
    Json(serde_json::Error),
    Config(ConfigError),
    NoModel,
    NoRows,
    ValidationFailed(usize),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<PostureError> for FluxCliError {
    fn from(e: PostureError) -> Self {
        FluxCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

impl From<ConfigError> for FluxCliError {
    fn from(e: ConfigError) -> Self {
        FluxCliError::Config(e)
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
            FluxCliError::Pipeline(e) => {
                let (code, hint) = match &e {
                    PostureError::FeatureMissing { .. } => (
                        "FEATURE_MISSING",
                        "Set [pipeline] feature_missing_policy to skip or abort_row",
                    ),
                    PostureError::Model(_) => ("MODEL_ERROR", "Check the classifier model file"),
                    PostureError::Parse(_) | PostureError::Json(_) => {
                        ("PARSE_ERROR", "Check input format")
                    }
                    _ => ("PIPELINE_ERROR", "Run validate on the input"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check input JSON format".to_string()),
            },
            FluxCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Check {} or the --config file", DEFAULT_CONFIG_PATH)),
            },
            FluxCliError::NoModel => CliError {
                code: "NO_MODEL".to_string(),
                message: "No classifier model configured".to_string(),
                hint: Some("Pass --model or set [model] path in the config".to_string()),
            },
            FluxCliError::NoRows => CliError {
                code: "NO_ROWS".to_string(),
                message: "No rows with a valid timestamp in input".to_string(),
                hint: Some("Run validate on the input".to_string()),
            },
            FluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows would be dropped", count),
                hint: Some("Fix the timestamps of the listed rows".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_rows: usize,
    clean_rows: usize,
    dropped_rows: usize,
    rows: Vec<ValidationRowDetail>,
}

#[derive(serde::Serialize)]
struct ValidationRowDetail {
    index: usize,
    issues: Vec<String>,
}
