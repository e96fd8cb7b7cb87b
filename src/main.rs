mod config;
mod emit;
mod marker;
mod parse;
mod record;
mod sink;

use clap::Parser;
use config::{Config, ConfigError, Overrides};
use emit::{EmitError, MissingPolicy};
use parse::ParseError;
use sink::{OutputSink, SinkError};
use std::path::PathBuf;

/// Extract per-run command length, bus utilization and accelerator stream
/// utilization from a speed-test simulation log and write them as CSV.
#[derive(Parser, Debug)]
#[command(name = "speedtest-parse", version, about)]
pub struct Cli {
    /// Simulation log to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// CSV file to write (overwritten). Ignored with --stdout
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Write the CSV to standard output instead of OUTPUT
    #[arg(long)]
    stdout: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to fill values a run never reported (overrides config)
    #[arg(long, value_enum)]
    missing: Option<MissingPolicy>,

    /// Digits after the decimal point for utilization columns (overrides config)
    #[arg(long)]
    precision: Option<usize>,

    /// Parse and render, log a summary, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (every run start and marker)
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            missing: self.missing,
            precision: self.precision,
            stdout: self.stdout,
        }
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_level()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(&cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Resolve config, scan the log, render the table, deliver it to the sink.
fn run(cli: &Cli) -> Result<(), AppError> {
    let mut cfg = Config::load_or_default(cli.config.as_deref())?;
    cfg.apply_overrides(&cli.overrides());

    let sink = resolve_sink(&cfg, cli.output.as_ref())?;

    let table = parse::parse_file(&cli.input, &cfg.markers)?;
    let csv = emit::emit_csv(&table, &cfg.emit_options())?;

    tracing::info!(
        input = %cli.input.display(),
        runs = table.len(),
        accelerators = table.acc_count,
        "parsed speed-test log"
    );
    if table.is_empty() {
        tracing::info!(
            run_start = %cfg.markers.run_start,
            "no run-start markers found, output will be header only"
        );
    }

    if cli.dry_run {
        tracing::info!(output = %sink.describe(), "dry run, not writing output");
        return Ok(());
    }

    sink.write_all(&csv)?;
    tracing::info!(output = %sink.describe(), bytes = csv.len(), "wrote CSV");
    Ok(())
}

fn resolve_sink(cfg: &Config, output: Option<&PathBuf>) -> Result<OutputSink, AppError> {
    if cfg.output.stdout {
        if let Some(path) = output {
            tracing::debug!(output = %path.display(), "output path ignored, writing to stdout");
        }
        return Ok(OutputSink::Stdout);
    }
    match output {
        Some(path) => Ok(OutputSink::File(path.clone())),
        None => Err(AppError::NoOutput),
    }
}

/// Anything that aborts an invocation.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Parse(ParseError),
    Emit(EmitError),
    Sink(SinkError),
    /// Neither an OUTPUT path nor stdout output was requested.
    NoOutput,
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "{e}"),
            AppError::Parse(e) => write!(f, "{e}"),
            AppError::Emit(e) => write!(f, "{e}"),
            AppError::Sink(e) => write!(f, "{e}"),
            AppError::NoOutput => write!(f, "no OUTPUT path given and stdout output not enabled"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Parse(e) => Some(e),
            AppError::Emit(e) => Some(e),
            AppError::Sink(e) => Some(e),
            AppError::NoOutput => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<ParseError> for AppError {
    fn from(e: ParseError) -> Self {
        AppError::Parse(e)
    }
}

impl From<EmitError> for AppError {
    fn from(e: EmitError) -> Self {
        AppError::Emit(e)
    }
}

impl From<SinkError> for AppError {
    fn from(e: SinkError) -> Self {
        AppError::Sink(e)
    }
}
