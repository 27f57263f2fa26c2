//! emx-conformance CLI
//!
//! Run an executable against JSON test specifications and print a report.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use emx_conformance::{RunConfig, TestRunner, EXIT_CONFIG_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "emx-conformance")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Run an executable against JSON test specifications")]
struct Cli {
    /// Executable under test (relative paths resolve against the current directory)
    executable: PathBuf,

    /// Directory containing specification files
    #[arg(short = 'd', long = "tests", default_value = "tests")]
    tests: PathBuf,

    /// Exit with 0 even if tests failed
    #[arg(long = "allow-failures")]
    allow_failures: bool,

    /// Only run specifications whose relative path contains this string (repeatable)
    #[arg(short = 'f', long = "filter")]
    filters: Vec<String>,

    /// Declare an available sidecar (repeatable)
    #[arg(short = 's', long = "sidecar")]
    sidecars: Vec<String>,

    /// File listing relative specification paths to skip
    #[arg(short = 'b', long)]
    blacklist: Option<PathBuf>,

    /// Maximum number of test cases run per specification
    #[arg(short = 'n', long = "max-cases")]
    max_cases: Option<usize>,

    /// Only scan files with these suffixes [default: all files]
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,

    /// Directory for staged (truncated) specifications
    #[arg(long = "staging-dir")]
    staging_dir: Option<PathBuf>,

    /// Show number of eligible specifications without running
    #[arg(long)]
    count: bool,

    /// Verbose diagnostics: mismatch diffs, executable stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let executable = if cli.executable.is_absolute() {
        cli.executable
    } else {
        cwd.join(cli.executable)
    };
    tracing::info!(executable = %executable.display(), "executable under test");

    let config = RunConfig {
        executable,
        dir: cli.tests,
        filters: cli.filters,
        sidecars: cli.sidecars.into_iter().collect(),
        blacklist: cli.blacklist,
        max_cases: cli.max_cases,
        extensions: cli.extensions,
        staging_dir: cli.staging_dir,
    };
    let runner = TestRunner::new(config);

    if cli.count {
        let count = runner.count_tests()?;
        println!("Found {} specification(s)", count);
        return Ok(0);
    }

    let report = runner.run_all()?;

    match cli.format {
        Format::Table => print!("{}", report.render_table()),
        Format::Csv => print!("{}", report.render_csv()),
        Format::Json => println!(
            "{}",
            report.render_json().context("failed to serialize report")?
        ),
    }
    tracing::info!("{}", report.summary());

    Ok(report.exit_code(cli.allow_failures))
}
