//! Materializes the script a runtime executes for one suite.
//!
//! The script is the harness preamble, the suite's entry file verbatim, and
//! a trailing call to the harness `run` with fixed options. It lives in a
//! fresh temporary directory that is left behind after the run.

use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::Builder;

/// Module specifier of the benchmarking harness.
pub const HARNESS: &str = "mitata";
/// Dependency directory linked into every script directory.
pub const DEPS_DIR: &str = "node_modules";

const SCRIPT_NAME: &str = "entry.mjs";
const TEMP_PREFIX: &str = "runtime-bench-";

/// How a particular runtime is driven.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeProfile {
  /// Specifier the preamble imports the harness from.
  pub import_specifier: String,
  /// Arguments placed before the script path.
  pub extra_args: Vec<String>,
  /// Whether stdout is captured as a fallback for the report instead of
  /// being forwarded to our own stdout.
  pub captures_stdout: bool,
}

impl Default for RuntimeProfile {
  fn default() -> Self {
    Self {
      import_specifier: HARNESS.to_string(),
      extra_args: Vec::new(),
      captures_stdout: false,
    }
  }
}

/// Runtime profiles keyed by runtime name. Unknown runtimes get the default
/// profile.
#[derive(Clone, Debug)]
pub struct Profiles {
  fallback: RuntimeProfile,
  by_name: HashMap<String, RuntimeProfile>,
}

impl Default for Profiles {
  fn default() -> Self {
    let mut profiles = Self {
      fallback: RuntimeProfile::default(),
      by_name: HashMap::new(),
    };

    // deno needs `--allow-sys` since the harness reads CPU info.
    profiles.insert(
      "deno",
      RuntimeProfile {
        import_specifier: format!("npm:{HARNESS}"),
        extra_args: vec!["run".to_string(), "--allow-sys".to_string()],
        captures_stdout: true,
      },
    );

    profiles
  }
}

impl Profiles {
  pub fn insert(&mut self, name: impl Into<String>, profile: RuntimeProfile) {
    self.by_name.insert(name.into(), profile);
  }

  pub fn get(&self, name: &str) -> &RuntimeProfile {
    self.by_name.get(name).unwrap_or(&self.fallback)
  }
}

/// Options passed to the harness `run`.
#[derive(Clone, Debug, Serialize)]
pub struct HarnessOptions {
  pub units: bool,
  pub avg: bool,
  pub json: bool,
  pub colors: bool,
  pub min_max: bool,
  pub percentiles: bool,
  /// Emit the report on stderr so stray stdout writes can't corrupt it.
  pub data_to_stderr: bool,
}

impl Default for HarnessOptions {
  fn default() -> Self {
    Self {
      units: false,
      avg: true,
      json: true,
      colors: true,
      min_max: true,
      percentiles: true,
      data_to_stderr: true,
    }
  }
}

/// A materialized script and the arguments to run it with.
#[derive(Debug)]
pub struct Script {
  pub dir: PathBuf,
  pub path: PathBuf,
  pub prefix_args: Vec<String>,
}

pub struct Materializer {
  deps_dir: PathBuf,
  options: HarnessOptions,
}

impl Materializer {
  pub fn new(deps_dir: PathBuf) -> Self {
    Self {
      deps_dir,
      options: HarnessOptions::default(),
    }
  }

  /// Renders the full script text around the suite's `benchmark` source.
  pub fn render(&self, profile: &RuntimeProfile, benchmark: &str) -> Result<String> {
    let options = serde_json::to_string(&self.options).context("serialize harness options")?;
    let specifier = &profile.import_specifier;

    Ok(format!(
      "// harness
import {{ run, bench, group, baseline }} from '{specifier}';

globalThis['runBenchmarks'] = run;
globalThis['bench'] = bench;
globalThis['group'] = group;
globalThis['baseline'] = baseline;

// benchmark
{benchmark}

// run
await run({options});
"
    ))
  }

  /// Writes the script for `entry` into a new temporary directory, with the
  /// dependency directory linked next to it.
  pub fn materialize(&self, entry: &Path, profile: &RuntimeProfile) -> Result<Script> {
    let benchmark = fs::read_to_string(entry).with_context(|| format!("read {entry:?}"))?;
    let script = self.render(profile, &benchmark)?;

    let dir = Builder::new()
      .prefix(TEMP_PREFIX)
      .tempdir()
      .context("tempdir")?
      .keep();
    let path = dir.join(SCRIPT_NAME);
    fs::write(&path, script).with_context(|| format!("write {path:?}"))?;

    let deps_link = dir.join(DEPS_DIR);
    link_dir(&self.deps_dir, &deps_link).with_context(|| format!("link {:?} to {deps_link:?}", self.deps_dir))?;

    Ok(Script {
      dir,
      path,
      prefix_args: profile.extra_args.clone(),
    })
  }
}

#[cfg(unix)]
fn link_dir(original: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn link_dir(original: &Path, link: &Path) -> std::io::Result<()> {
  std::os::windows::fs::symlink_dir(original, link)
}
