//! CLTV - Customer Lifetime Value Forecasting
//!
//! The entry point for the `cltv` binary, handling:
//! - Loading customer aggregates from CSV
//! - Fitting BG/NBD and Gamma-Gamma and synthesizing lifetime values
//! - Rendering results as JSON, JSONL, CSV or a human summary
//! - Configuration validation

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use cltv_common::{OutputFormat, RunId, StructuredError};
use cltv_core::config::{load_config, ResolvedConfig, CONFIG_SCHEMA_VERSION};
use cltv_core::data::load_csv;
use cltv_core::exit_codes::ExitCode;
use cltv_core::logging::{event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage};
use cltv_core::output::{write_report, DEFAULT_TOP};
use cltv_core::CltvPipeline;
use std::io::Write;
use std::path::PathBuf;

/// CLTV - Forecast customer lifetime value with BG/NBD and Gamma-Gamma
#[derive(Parser)]
#[command(name = "cltv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to cltv.json (overrides CLTV_CONFIG and XDG lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log level (overrides CLTV_LOG / RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (overrides CLTV_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the CLTV pipeline on a customer CSV
    Run(RunArgs),

    /// Validate the resolved configuration
    CheckConfig,

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Customer aggregates CSV
    input: PathBuf,

    /// Write results here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Customers listed in the summary format
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Fixed analysis reference date (YYYY-MM-DD)
    #[arg(long)]
    analysis_date: Option<NaiveDate>,

    /// Worker threads for per-customer stages (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Run(args) => run_pipeline(&cli.global, args),
        Commands::CheckConfig => run_check_config(&cli.global),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_pipeline(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let ctx = LogContext::new(RunId::new());

    let resolved = match load_config(global.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => return output_error(global, &e.into()),
    };
    log_config_source(&ctx, &resolved);

    let snapshot = resolved.snapshot();
    let mut config = resolved.config;
    if let Some(date) = args.analysis_date {
        config.features.analysis_date = Some(date);
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let population = match load_csv(&args.input) {
        Ok(population) => population,
        Err(e) => return output_error(global, &e.into()),
    };
    cltv_core::log_event!(
        ctx,
        INFO,
        event_names::LOAD_FINISHED,
        Stage::Load,
        "customer aggregates loaded",
        customers = population.len(),
        path = tracing::field::display(args.input.display())
    );

    let pipeline = CltvPipeline::new(config).with_context(ctx.clone());
    let mut report = match pipeline.run(population) {
        Ok(report) => report,
        Err(e) => return output_error(global, &e.into()),
    };
    report.config = Some(snapshot);

    let written = match &args.output {
        Some(path) => std::fs::File::create(path)
            .map_err(cltv_common::Error::from)
            .and_then(|file| {
                let mut writer = std::io::BufWriter::new(file);
                write_report(&report, global.format, args.top, &mut writer)
            }),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_report(&report, global.format, args.top, &mut lock)
        }
    };
    if let Err(e) = written {
        return output_error(global, &e);
    }
    cltv_core::log_event!(
        ctx,
        INFO,
        event_names::OUTPUT_WRITTEN,
        Stage::Output,
        "results written",
        format = tracing::field::display(global.format),
        customers = report.results.len()
    );

    if report.segmentation.is_segmented() {
        ExitCode::Clean
    } else {
        ExitCode::Unsegmented
    }
}

fn log_config_source(ctx: &LogContext, resolved: &ResolvedConfig) {
    if resolved.is_default() {
        cltv_core::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no cltv.json found; using built-in defaults"
        );
    } else {
        let path = resolved
            .path
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        cltv_core::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = path.as_str(),
            source = tracing::field::display(&resolved.path.source)
        );
    }
}

fn run_check_config(global: &GlobalOpts) -> ExitCode {
    match load_config(global.config.as_deref()) {
        Ok(resolved) => {
            let snapshot = resolved.snapshot();
            if global.format.is_machine_readable() {
                let response = serde_json::json!({
                    "status": "valid",
                    "config": snapshot,
                    "settings": resolved.config,
                });
                println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
            } else {
                println!("# Configuration Validation");
                println!();
                println!("Status: ✓ Valid");
                match &snapshot.config_path {
                    Some(path) => println!("File: {} ({})", path, snapshot.config_source),
                    None => println!("File: using built-in defaults"),
                }
                println!("Schema version: {}", snapshot.schema_version);
                println!("Effective hash: {}", snapshot.effective_hash);
            }
            ExitCode::Clean
        }
        Err(e) => output_error(global, &e.into()),
    }
}

/// Report an error on stderr in the appropriate format.
fn output_error(global: &GlobalOpts, error: &cltv_common::Error) -> ExitCode {
    if global.format.is_machine_readable() {
        eprintln!("{}", StructuredError::from(error).to_json());
    } else {
        eprintln!("{}", error.format_human());
    }
    let _ = std::io::stderr().flush();
    ExitCode::for_error(error)
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "cltv_version": env!("CARGO_PKG_VERSION"),
        "config_schema_version": CONFIG_SCHEMA_VERSION,
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    if global.format.is_machine_readable() {
        println!("{}", serde_json::to_string_pretty(&version_info).unwrap_or_default());
    } else {
        println!("cltv {}", env!("CARGO_PKG_VERSION"));
        println!("config schema version: {}", CONFIG_SCHEMA_VERSION);
    }
}
