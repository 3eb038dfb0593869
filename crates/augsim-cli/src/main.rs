//! augsim CLI
//!
//! Command-line tool for merging mortality record files and adding the
//! derived SIM columns.

use augsim_core::{
    format_elapsed, read_table, CombineRule, Completion, Error, FormatRegistry, Layout, Pipeline,
    PipelineEvent, PipelineFailure, RunConfig, RunReport, Stage,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "augsim")]
#[command(about = "Merge and augment mortality record tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Log more (-v info, -vv debug); AUGSIM_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read, augment and write a set of tables
    Run {
        /// Input files or directories
        inputs: Vec<PathBuf>,

        /// Glob pattern selecting (or filtering) inputs
        #[arg(short, long)]
        pattern: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (csv or json); inferred from the output path by default
        #[arg(long)]
        format: Option<String>,

        /// How input tables are combined
        #[arg(long, value_enum)]
        combine: Option<Combine>,

        /// Key column for --combine key
        #[arg(long, required_if_eq("combine", "key"))]
        key: Option<String>,

        /// Record layout (oct2020 or dec2020), detected per table by default
        #[arg(long, value_parser = parse_layout)]
        layout: Option<Layout>,

        /// Keep the combined table as is, without derived columns
        #[arg(long)]
        no_derive: bool,

        /// Run configuration file (JSON); flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Read a single file and display its head
    Inspect {
        /// Path to the file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List the supported file formats
    Formats,

    /// Create a run configuration template
    CreateConfig {
        /// Output path for the configuration file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Combine {
    /// Append the rows of every table
    Concat,
    /// Merge rows sharing the same key value
    Key,
}

fn parse_layout(name: &str) -> Result<Layout, String> {
    Layout::from_name(name).ok_or_else(|| format!("unknown layout '{}'", name))
}

/// A failure reported to the user
enum CliError {
    Core(Error),
    Run(PipelineFailure),
    Usage(String),
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Core(e)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Core(e) => write!(f, "error[{}]: {}", e.kind(), e),
            CliError::Run(failure) => write!(
                f,
                "error[{}] at {}: {}",
                failure.kind(),
                failure.stage,
                failure.error
            ),
            CliError::Usage(msg) => write!(f, "error: {}", msg),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("AUGSIM_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run {
            inputs,
            pattern,
            output,
            format,
            combine,
            key,
            layout,
            no_derive,
            config,
            json,
        } => {
            let mut config = match config {
                Some(path) => RunConfig::load(&path)?,
                None => RunConfig::default(),
            };
            if !inputs.is_empty() {
                config.request.inputs = inputs;
            }
            if pattern.is_some() {
                config.request.pattern = pattern;
            }
            if let Some(output) = output {
                config.request.output = output;
            }
            if format.is_some() {
                config.request.format = format;
            }
            match (combine, key) {
                (Some(Combine::Concat), _) => config.augment.combine = CombineRule::Concatenate,
                (Some(Combine::Key), Some(key)) => {
                    config.augment.combine = CombineRule::MergeOnKey { key }
                }
                (Some(Combine::Key), None) => {
                    return Err(CliError::Usage("--combine key requires --key".to_string()))
                }
                (None, Some(_)) => {
                    return Err(CliError::Usage("--key requires --combine key".to_string()))
                }
                (None, None) => {}
            }
            if let Some(layout) = layout {
                config.augment.layout = Some(layout);
            }
            if no_derive {
                config.augment.derive_sim_columns = false;
            }
            if config.request.output.as_os_str().is_empty() {
                return Err(CliError::Usage(
                    "an output file is required (--output or the configuration file)".to_string(),
                ));
            }
            cmd_run(config, json)
        }
        Commands::Inspect { file, limit } => cmd_inspect(&file, limit),
        Commands::Formats => cmd_formats(),
        Commands::CreateConfig { output } => cmd_create_config(&output),
    }
}

fn cmd_run(config: RunConfig, json: bool) -> Result<(), CliError> {
    tracing::debug!(?config, "run configuration");
    let pipeline = Pipeline::from_config(&config.augment);
    let handle = pipeline.spawn(config.request);

    let mut progress = ProgressLine::default();
    for event in handle.events().iter() {
        match event {
            PipelineEvent::StageStarted(stage) => progress.stage(&stage),
            PipelineEvent::Progress(state) => {
                progress.render(state.overall, state.current_file.as_deref())
            }
            PipelineEvent::Finished(completion) => {
                progress.clear();
                if let Completion::Succeeded { elapsed, output, rows, columns } = completion {
                    eprintln!(
                        "Wrote {} rows x {} columns to {} in {}",
                        rows,
                        columns,
                        output.display(),
                        format_elapsed(elapsed)
                    );
                }
                break;
            }
        }
    }

    let report = handle.wait().map_err(CliError::Run)?;
    if json {
        print_report(&report)?;
    }
    Ok(())
}

fn print_report(report: &RunReport) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::Core(Error::Io(io::Error::other(e))))?;
    println!("{}", json);
    Ok(())
}

/// Single progress line on stderr, redrawn in place
#[derive(Default)]
struct ProgressLine {
    label: String,
    last_percent: Option<u32>,
}

impl ProgressLine {
    fn stage(&mut self, stage: &Stage) {
        self.label = stage.to_string();
        self.last_percent = None;
    }

    fn render(&mut self, overall: f64, file: Option<&Path>) {
        let percent = (overall * 100.0).floor() as u32;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);

        let file = file
            .and_then(|p| p.file_name())
            .map(|n| format!(" {}", n.to_string_lossy()))
            .unwrap_or_default();
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K[{:>3}%] {}{}", percent, self.label, file);
        let _ = stderr.flush();
    }

    fn clear(&mut self) {
        if self.last_percent.is_some() {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "\r\x1b[2K");
            let _ = stderr.flush();
        }
    }
}

fn cmd_inspect(file: &Path, limit: usize) -> Result<(), CliError> {
    let table = read_table(file)?;

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();

    let header = table.column_names();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }

    Ok(())
}

fn cmd_formats() -> Result<(), CliError> {
    let registry = FormatRegistry::with_defaults();

    println!("Formats ({}):", registry.iter().count());
    for format in registry.iter() {
        let mode = if format.can_encode() { "read/write" } else { "read" };
        println!("  {:<6} {:<10} .{}", format.id(), mode, format.extensions().join(", ."));
    }

    Ok(())
}

fn cmd_create_config(output: &Path) -> Result<(), CliError> {
    RunConfig::template().save(output)?;
    println!("Created configuration template: {}", output.display());
    println!();
    println!("Edit the file to choose inputs and output, then run:");
    println!("  augsim run --config {}", output.display());

    Ok(())
}
