mod bench;
mod config;
mod error;
mod ext;
mod format;
mod resolve;
mod results;
mod run;
mod script;

use std::{
  path::PathBuf,
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use self::{bench::Bench, run::Executor, script::Materializer};

/// Runs a benchmark suite across several language runtimes and merges the
/// results into one report.
#[derive(Parser)]
#[command(name = "runtime-bench")]
struct Args {
  /// Suite file (.json, .yaml or .yml).
  suite: PathBuf,
  /// Where to write the merged results, relative to the working directory.
  #[arg(default_value = "bench-results.json")]
  output: PathBuf,
  /// Dependency directory made visible to every benchmark script.
  #[arg(long, default_value = script::DEPS_DIR)]
  deps_dir: PathBuf,
  /// Kill a benchmark after this many seconds. Waits indefinitely if unset.
  #[arg(long)]
  timeout: Option<u64>,
  /// Log debug output.
  #[arg(short, long)]
  verbose: bool,
}

fn init_logging(verbose: bool) {
  let level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  FmtSubscriber::builder()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .compact()
    .init();
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.verbose);

  let cwd = std::env::current_dir().context("current dir")?;

  info!("Reading suite from {}...", args.suite.display());
  let config = config::load_suite(&args.suite).context("load suite")?;
  debug!("suite for execution: {}", serde_json::to_string_pretty(&config)?);

  let executor =
    Executor::new(Materializer::new(cwd.join(&args.deps_dir))).with_timeout(args.timeout.map(Duration::from_secs));
  let mut bench = Bench::new(executor).context("Bench::new")?;

  let start = Instant::now();
  let results = bench.execute(&config).context("execute suite")?;

  info!(
    "All benchmarks completed in {}ms. Writing to '{}'...",
    start.elapsed().as_millis(),
    args.output.display()
  );
  println!("{}", format::format(&results).context("format")?);

  let output = cwd.join(&args.output);
  results.write(&output).context("write results")?;
  info!("Done! Results written to '{}'.", output.display());

  Ok(())
}
